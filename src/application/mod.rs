pub mod blocks;
pub mod bootstrap;
pub mod compliance;
pub mod goals;
pub mod state;
pub mod validation;

#[cfg(test)]
mod test_support;
