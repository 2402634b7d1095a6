/*
General MIDI Percussion Keys
============================

Key numbers from the General MIDI percussion map (channel 10, which is
channel index 9 when counting from zero). Only the short, dry instruments that
make a usable click are listed.

Example usage:
  ClickSpec { key: CLAVES, channel: PERCUSSION_CHANNEL, .. }
*/

/// Zero-based GM percussion channel
pub const PERCUSSION_CHANNEL: u8 = 9;

pub const SIDE_STICK: u8 = 37;
pub const CLOSED_HI_HAT: u8 = 42;
pub const COWBELL: u8 = 56;
pub const CLAVES: u8 = 75;
pub const HI_WOOD_BLOCK: u8 = 76;
pub const LOW_WOOD_BLOCK: u8 = 77;
