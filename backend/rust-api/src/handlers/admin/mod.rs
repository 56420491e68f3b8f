mod courses;
mod payments;
mod stats;
mod users;

pub use courses::*;
pub use payments::*;
pub use stats::*;
pub use users::*;
