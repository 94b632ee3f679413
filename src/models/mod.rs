pub mod content;
pub mod record;
pub mod result;

pub use content::*;
pub use record::*;
pub use result::*;
