mod luhn;

pub use luhn::luhn_valid;
