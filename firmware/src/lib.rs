#![cfg_attr(not(test), no_std)]

pub mod adc;

pub use adc::Stm32Adc;
