pub mod clock;
pub mod error;

#[cfg(test)]
pub mod test_fixtures;
