mod keithley_2600;
mod scpi_multimeter;

pub use keithley_2600::Keithley2600;
pub use scpi_multimeter::ScpiMultimeter;
