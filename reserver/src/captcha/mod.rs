pub mod normalize;
pub mod solver;

pub use normalize::normalize_code;
pub use solver::{CaptchaError, CaptchaSolver, HttpOcrSolver};
