//! Post-build step for ESP32 firmware: merges the bootloader, partition
//! table, extra flash images and the application binary into a single image
//! with `esptool merge_bin`, so the device can be flashed with one command.

pub mod action;
pub mod cli;
pub mod command;
pub mod config;
pub mod env;
pub mod hooks;
pub mod image;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
