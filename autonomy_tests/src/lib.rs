/*! # Autonomy Tests

Steppers that drive a server and its clients frame by frame, and the
end-to-end scenarios built on them.
*/

extern crate alloc;

pub mod stepper;

#[cfg(test)]
mod plugin;
#[cfg(test)]
mod scenarios;
