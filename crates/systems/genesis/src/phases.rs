//! Select-phase table and per-cycle decode.
//!
//! A pad multiplexes its buttons onto D0..D3, TL and TR according to the
//! select line. A three-button pad only follows the select level. A
//! six-button pad also counts select rising edges: on the third low phase it
//! pulls D0..D3 low all at once, and on the following high phase it shows
//! Z/Y/X/Mode instead of the directions. The counter resets after ~1.5 ms
//! without a rising edge.
//!
//! ```text
//! phase   select  D0    D1    D2    D3     TL  TR
//!   0       L     (settle)
//!   1       H     (settle)
//!   2       L     Up    Down  0     0      A   Start   identify
//!   3       H     Up    Down  Left  Right  B   C
//!   4       L     0     0     0     0      A   Start   six-button probe
//!   5       H     Z     Y     X     Mode   B   C
//!   6       L     Home  -     -     -      A   Start   8BitDo only
//!   7       H     (idle)
//! ```

use crate::GenesisButtons;
use pad_core::line::Level;
use serde::{Deserialize, Serialize};

/// What a phase contributes to the decoded word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseRole {
    Settle,
    Identify,
    Directions,
    SixButtonProbe,
    Extended,
    Home,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub select: Level,
    pub role: PhaseRole,
}

pub const PHASES_PER_CYCLE: usize = 8;

pub const PHASES: [Phase; PHASES_PER_CYCLE] = [
    Phase {
        select: Level::Low,
        role: PhaseRole::Settle,
    },
    Phase {
        select: Level::High,
        role: PhaseRole::Settle,
    },
    Phase {
        select: Level::Low,
        role: PhaseRole::Identify,
    },
    Phase {
        select: Level::High,
        role: PhaseRole::Directions,
    },
    Phase {
        select: Level::Low,
        role: PhaseRole::SixButtonProbe,
    },
    Phase {
        select: Level::High,
        role: PhaseRole::Extended,
    },
    Phase {
        select: Level::Low,
        role: PhaseRole::Home,
    },
    Phase {
        select: Level::High,
        role: PhaseRole::Idle,
    },
];

/// D0..D3 during a direction phase.
pub const DIRECTION_MAP: [GenesisButtons; 4] = [
    GenesisButtons::UP,
    GenesisButtons::DOWN,
    GenesisButtons::LEFT,
    GenesisButtons::RIGHT,
];

/// D0..D3 during the extended phase of a six-button pad.
pub const EXTENDED_MAP: [GenesisButtons; 4] = [
    GenesisButtons::Z,
    GenesisButtons::Y,
    GenesisButtons::X,
    GenesisButtons::MODE,
];

/// D2 and D3 both low while select is low marks a Mega Drive pad.
const IDENTIFY_MASK: u8 = 0b1100;
const ALL_DATA: u8 = 0b1111;

/// Pad family recognised during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PadKind {
    #[default]
    Disconnected,
    /// Never identified; directions plus two fire buttons reported as B/C.
    MasterSystem,
    ThreeButton,
    SixButton,
}

/// Inputs sampled after one select change. `data_low` bit `n` is D`n` low.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSample {
    pub data_low: u8,
    pub tl_low: bool,
    pub tr_low: bool,
}

/// Result of decoding one full cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleWord {
    pub buttons: GenesisButtons,
    pub kind: PadKind,
}

fn map_bits(low: u8, map: &[GenesisButtons; 4]) -> GenesisButtons {
    map.iter()
        .enumerate()
        .filter(|(bit, _)| low & (1 << bit) != 0)
        .fold(GenesisButtons::empty(), |acc, (_, b)| acc | *b)
}

/// Decode one cycle of samples, starting from an empty word.
pub fn decode_cycle(samples: &[PhaseSample; PHASES_PER_CYCLE]) -> CycleWord {
    let mut buttons = GenesisButtons::empty();
    let mut mega_drive = false;
    let mut six_button = false;

    for (phase, s) in PHASES.iter().zip(samples.iter()) {
        match phase.role {
            PhaseRole::Settle | PhaseRole::Idle => {}
            PhaseRole::Identify => {
                if s.data_low & IDENTIFY_MASK == IDENTIFY_MASK {
                    mega_drive = true;
                    if s.tl_low {
                        buttons |= GenesisButtons::A;
                    }
                    if s.tr_low {
                        buttons |= GenesisButtons::START;
                    }
                }
            }
            PhaseRole::Directions => {
                buttons |= map_bits(s.data_low, &DIRECTION_MAP);
                if s.tl_low {
                    buttons |= GenesisButtons::B;
                }
                if s.tr_low {
                    buttons |= GenesisButtons::C;
                }
            }
            PhaseRole::SixButtonProbe => {
                six_button = mega_drive && s.data_low & ALL_DATA == ALL_DATA;
            }
            PhaseRole::Extended => {
                if six_button {
                    buttons |= map_bits(s.data_low, &EXTENDED_MAP);
                }
            }
            PhaseRole::Home => {
                if six_button && s.data_low & 0b0001 != 0 {
                    buttons |= GenesisButtons::HOME;
                }
            }
        }
    }

    let kind = if six_button {
        PadKind::SixButton
    } else if mega_drive {
        PadKind::ThreeButton
    } else if !buttons.is_empty() {
        PadKind::MasterSystem
    } else {
        PadKind::Disconnected
    };
    CycleWord { buttons, kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> [PhaseSample; PHASES_PER_CYCLE] {
        [PhaseSample::default(); PHASES_PER_CYCLE]
    }

    /// A released three-button pad: D2/D3 forced low on every low phase.
    fn three_button() -> [PhaseSample; PHASES_PER_CYCLE] {
        let mut s = idle();
        for (sample, phase) in s.iter_mut().zip(PHASES.iter()) {
            if phase.select.is_low() {
                sample.data_low = IDENTIFY_MASK;
            }
        }
        s
    }

    #[test]
    fn test_table_alternates_low_high() {
        for (i, phase) in PHASES.iter().enumerate() {
            assert_eq!(phase.select.is_high(), i % 2 == 1);
        }
    }

    #[test]
    fn test_idle_lines_are_disconnected() {
        let w = decode_cycle(&idle());
        assert_eq!(w.kind, PadKind::Disconnected);
        assert!(w.buttons.is_empty());
    }

    #[test]
    fn test_three_button_identify_reads_a_and_start() {
        let mut s = three_button();
        s[2].tl_low = true;
        s[2].tr_low = true;
        s[3].tl_low = true;
        let w = decode_cycle(&s);
        assert_eq!(w.kind, PadKind::ThreeButton);
        assert_eq!(
            w.buttons,
            GenesisButtons::A | GenesisButtons::START | GenesisButtons::B
        );
    }

    #[test]
    fn test_six_button_extended_bits_only_after_probe() {
        let mut s = three_button();
        s[5].data_low = 0b1001;
        // no probe: Z and Mode must be ignored
        assert_eq!(decode_cycle(&s).buttons, GenesisButtons::empty());

        s[4].data_low = ALL_DATA;
        let w = decode_cycle(&s);
        assert_eq!(w.kind, PadKind::SixButton);
        assert_eq!(w.buttons, GenesisButtons::Z | GenesisButtons::MODE);
    }

    #[test]
    fn test_home_needs_six_button() {
        let mut s = three_button();
        s[6].data_low = 0b1101;
        assert!(!decode_cycle(&s).buttons.contains(GenesisButtons::HOME));

        s[4].data_low = ALL_DATA;
        s[6].data_low = 0b0001;
        assert!(decode_cycle(&s).buttons.contains(GenesisButtons::HOME));
    }

    #[test]
    fn test_master_system_fallback() {
        let mut s = idle();
        for sample in s.iter_mut() {
            sample.data_low = 0b0001;
            sample.tr_low = true;
        }
        let w = decode_cycle(&s);
        assert_eq!(w.kind, PadKind::MasterSystem);
        assert_eq!(w.buttons, GenesisButtons::UP | GenesisButtons::C);
    }
}
