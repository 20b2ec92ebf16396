//! Cross-crate integration flows.

#[cfg(test)]
mod identity;
#[cfg(test)]
mod trust;
