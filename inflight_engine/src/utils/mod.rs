pub mod object_pool;

pub use object_pool::ObjectPool;
