pub mod alert;
pub mod reading;

pub use alert::*;
pub use reading::*;
