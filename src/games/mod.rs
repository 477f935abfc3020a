//! Game units shipped with the portal

mod number_guess;

pub use number_guess::NumberGuess;
