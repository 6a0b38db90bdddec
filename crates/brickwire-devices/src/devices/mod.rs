/*!
 * Stock device implementations.
 */

pub mod motor;
pub mod raw;

pub use motor::EncoderMotor;
pub use raw::RawSensor;
