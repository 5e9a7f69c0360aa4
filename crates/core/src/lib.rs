pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use domain::intent::IntentCategory;
pub use domain::lead::Lead;
pub use domain::message::{Direction, Message, UserId};
pub use domain::product::{Product, ProductKey};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::{BulkDiscountCalculator, DiscountPolicy, PricedQuote, QuoteCalculator};
