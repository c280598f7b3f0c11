mod alert;
mod reading;

pub use alert::*;
pub use reading::*;
