pub mod pool;
pub mod table;
