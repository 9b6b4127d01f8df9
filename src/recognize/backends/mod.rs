pub mod cpu;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::{anyhow, Result};

use crate::config::RecognitionSettings;
use crate::recognize::backend::FaceEncoder;

pub use cpu::SignatureEncoder;
pub use stub::ScriptedEncoder;

#[cfg(feature = "backend-tract")]
pub use tract::TractEncoder;

/// Build the encoder named in the recognition settings.
pub fn build_encoder(settings: &RecognitionSettings) -> Result<Box<dyn FaceEncoder>> {
    let mut encoder: Box<dyn FaceEncoder> = match settings.backend.as_str() {
        "cpu" => Box::new(SignatureEncoder::new()),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract encoder requires recognition.model_path"))?;
            Box::new(TractEncoder::new(
                model_path,
                settings.model_input_width,
                settings.model_input_height,
            )?)
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => return Err(anyhow!("tract encoder requires the backend-tract feature")),
        other => return Err(anyhow!("unknown encoder backend '{}'", other)),
    };
    encoder.warm_up()?;
    log::info!("face encoder backend: {}", encoder.name());
    Ok(encoder)
}
