pub mod intent;
pub mod lead;
pub mod message;
pub mod product;
