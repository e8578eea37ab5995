//! Integration tests exercising the filter subsystem end to end, on top
//! of the unit tests embedded in each `src/filter/*` module.

#[cfg(test)]
mod integration;
#[cfg(test)]
mod property_tests;
