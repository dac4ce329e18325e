pub mod error;
pub mod manager;

#[cfg(test)]
mod tests;
