//! Speaker

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;

use crate::apis::peripheral::{Peripheral, PeripheralAccess};
use crate::bridge::decl::{ClassDecl, Declared, MethodDecl, ParamType};
use crate::runtime::arguments::EnumDecl;
use crate::runtime::error::MethodError;

/// Note block instruments
pub static INSTRUMENT: EnumDecl = EnumDecl::new(
    "Instrument",
    &[
        "harp", "basedrum", "snare", "hat", "bass", "flute", "bell", "guitar", "chime",
        "xylophone", "iron_xylophone", "cow_bell", "didgeridoo", "bit", "banjo", "pling",
    ],
);

const MAX_VOLUME: f64 = 3.0;
const MAX_PITCH: f64 = 24.0;

/// Something the speaker played
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sound {
    pub name: String,
    pub volume: f64,
    pub pitch: f64,
}

/// Plays notes and sounds
#[derive(Debug, Default)]
pub struct Speaker {
    played: Mutex<Vec<Sound>>,
}

impl Speaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything played so far, oldest first
    pub fn played(&self) -> Vec<Sound> {
        self.played.lock().clone()
    }

    fn play(
        &self,
        name: String,
        volume: Option<f64>,
        pitch: Option<f64>,
    ) -> bool {
        let sound = Sound {
            name,
            volume: volume.unwrap_or(1.0).clamp(0.0, MAX_VOLUME),
            pitch: pitch.unwrap_or(1.0).clamp(0.0, MAX_PITCH),
        };
        self.played.lock().push(sound);
        true
    }
}

static SPEAKER: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<Speaker>("Speaker")
        .method(
            MethodDecl::instance("playNote", |call| {
                let instrument = INSTRUMENT.variants[call.ordinal(0)?];
                Ok(call.receiver::<Speaker>()?.play(
                    format!("note.{}", instrument),
                    call.opt_number(1)?,
                    call.opt_number(2)?,
                ))
            })
            .param(ParamType::Enum(&INSTRUMENT))
            .param(ParamType::optional(ParamType::Number))
            .param(ParamType::optional(ParamType::Number)),
        )
        .method(
            MethodDecl::instance("playSound", |call| {
                let name = call.string(0)?;
                if name.is_empty() {
                    return Err(MethodError::bad_argument(0, "sound name cannot be empty"));
                }
                Ok(call.receiver::<Speaker>()?.play(
                    name.to_string(),
                    call.opt_number(1)?,
                    call.opt_number(2)?,
                ))
            })
            .param(ParamType::String)
            .param(ParamType::optional(ParamType::Number))
            .param(ParamType::optional(ParamType::Number)),
        )
});

impl Declared for Speaker {
    fn declaration(&self) -> &'static ClassDecl {
        &SPEAKER
    }
}

impl Peripheral for Speaker {
    fn get_type(&self) -> &str {
        "speaker"
    }

    fn detach(
        &self,
        _access: &Arc<PeripheralAccess>,
    ) {
        self.played.lock().clear();
    }
}
