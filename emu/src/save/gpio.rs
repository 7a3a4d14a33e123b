// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The 4-pin GPIO port mapped into cartridge header space, used to carry the
//! RTC's clock/data/select lines.

pub struct Gpio {
    direction: u8,
    value: u8,
    read_enable: bool,
}

impl Gpio {
    pub fn new() -> Self {
        Self {
            direction: 0,
            value: 0,
            read_enable: false,
        }
    }

    pub fn pin(&self, index: u8) -> bool {
        (self.value >> index) & 1 != 0
    }

    pub fn set_pin(&mut self, index: u8, high: bool) {
        if high {
            self.value |= 1 << index;
        } else {
            self.value &= !(1 << index);
        }
    }

    pub fn set_direction(&mut self, direction: u8) {
        self.direction = direction & 0x0f;
    }

    pub fn is_output(&self, index: u8) -> bool {
        (self.direction >> index) & 1 != 0
    }

    pub fn set_read_enable(&mut self, enable: bool) {
        self.read_enable = enable;
    }

    pub fn read_enabled(&self) -> bool {
        self.read_enable
    }
}

impl Default for Gpio {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_round_trip() {
        let mut gpio = Gpio::new();
        gpio.set_direction(0b0111);
        gpio.set_pin(1, true);
        assert!(gpio.pin(1));
        assert!(gpio.is_output(0));
        assert!(!gpio.is_output(3));
    }
}
