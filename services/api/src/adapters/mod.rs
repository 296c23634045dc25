pub mod db;
pub mod memory;
pub mod stripe;

pub use db::DbAdapter;
pub use memory::MemoryDb;
pub use stripe::StripeAdapter;
