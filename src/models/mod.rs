pub mod encounter;
pub mod history;
pub mod insurance;
pub mod issue;
pub mod lenient;
pub mod patient;

pub use encounter::*;
pub use history::*;
pub use insurance::*;
pub use issue::*;
pub use patient::*;
