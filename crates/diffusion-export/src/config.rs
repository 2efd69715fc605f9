//! Shared numeric constants behind a family's traced tensor shapes.

/// The shape constants a family's submodel descriptors are built from.
///
/// Each family hands an explicit record to the registry instead of keeping
/// these as process-wide globals, so two conversions with different sizes
/// can coexist in one process.
#[derive(Debug, Clone)]
pub struct ShapeConfig {
    /// Pixel extent of images entering the autoencoder.
    pub vae_sample_size: i64,
    /// Channel count of the latent space.
    pub latent_channels: i64,
    /// Spatial extent of the latent space.
    pub unet_sample_size: i64,
    /// Width of the text-conditioning embedding.
    pub cross_attention_dim: i64,
    /// Token window of the CLIP-style text encoders.
    pub token_length: i64,
    /// Token window of the long-context text encoder, where present.
    pub text_sequence: i64,
    /// Width of the pooled text embedding (SDXL-style conditioning).
    pub text_embeds_size: i64,
    /// Number of micro-conditioning time ids (SDXL-style conditioning).
    pub time_ids_size: i64,
}

impl Default for ShapeConfig {
    /// Stable Diffusion 1.x sizes.
    fn default() -> Self {
        Self {
            vae_sample_size: 512,
            latent_channels: 4,
            unet_sample_size: 64,
            cross_attention_dim: 768,
            token_length: 77,
            text_sequence: 512,
            text_embeds_size: 1280,
            time_ids_size: 6,
        }
    }
}
