//! Relay output and status line.

use esp_idf_svc::hal::gpio::{Output, OutputPin, PinDriver};
use esp_idf_svc::hal::peripheral::Peripheral;
use log::{info, warn};

use relay_core::{RelayOutput, StatusDisplay};

/// Relay driven by a push-pull GPIO. High means on.
pub struct GpioRelay<'d, P: OutputPin> {
    pin: PinDriver<'d, P, Output>,
}

impl<'d, P: OutputPin> GpioRelay<'d, P> {
    /// Configure `pin` as an output, starting with the relay off.
    pub fn new(pin: impl Peripheral<P = P> + 'd) -> anyhow::Result<Self> {
        let mut pin = PinDriver::output(pin)?;
        pin.set_low()?;
        Ok(Self { pin })
    }
}

impl<P: OutputPin> RelayOutput for GpioRelay<'_, P> {
    fn set(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            warn!("Failed to drive relay pin: {}", e);
        }
    }
}

/// Status line on the serial console.
#[derive(Debug, Default)]
pub struct LogDisplay {
    last: String,
}

impl StatusDisplay for LogDisplay {
    fn show(&mut self, text: &str) {
        if self.last != text {
            info!("[status] {}", text);
            self.last = text.to_string();
        }
    }
}
