//! The model-family registry.
//!
//! One entry per supported pipeline. Each family declares its submodels:
//! tokenizer directories copied verbatim, and exported graphs with the
//! invocation contract the tracer was driven to produce (named inputs and
//! outputs with element types and shapes) plus the patches the exported
//! graph needs. Shapes are built from the family's [`ShapeConfig`] record;
//! pipelines whose originals pinned exotic extents keep those literals.

use clap::ValueEnum;
use onnx_graph::{Dim, ElementType, PrecisionRule, TensorSpec};
use strum::Display;

use crate::config::ShapeConfig;

use onnx_graph::Dim::{Any, Fixed};

/// Batch dimension, symbolic in every exported graph.
const BATCH: Dim = Dim::Named("batch");

/// The diffusion pipelines this driver can package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ModelFamily {
    StableDiffusion,
    StableDiffusionXl,
    StableDiffusion3,
    StableCascade,
    Flux,
    Wan,
    HunyuanVideo,
    LtxVideo,
    CogVideoX,
    PixArtSigma,
    ControlNet,
}

/// How one submodel is packaged.
#[derive(Debug, Clone)]
pub enum SubmodelPlan {
    /// Copy the source directory, skipping the listed file names.
    CopyDir {
        /// File names excluded from the copy.
        ignore: Vec<&'static str>,
    },
    /// Resolve, patch and re-serialize an exported graph.
    Graph(GraphPlan),
}

/// Invocation contract and patch plan of one exported graph.
#[derive(Debug, Clone)]
pub struct GraphPlan {
    /// Expected declared inputs, in order.
    pub inputs: Vec<TensorSpec>,
    /// Expected declared outputs, in order.
    pub outputs: Vec<TensorSpec>,
    /// Widen float16 boundaries to float32 after patching.
    pub normalize_io: bool,
    /// Precision patches applied before serialization.
    pub precision_rules: Vec<PrecisionRule>,
}

impl GraphPlan {
    fn plain(inputs: Vec<TensorSpec>, outputs: Vec<TensorSpec>) -> Self {
        Self {
            inputs,
            outputs,
            normalize_io: false,
            precision_rules: Vec::new(),
        }
    }
}

/// One named submodel of a family.
#[derive(Debug, Clone)]
pub struct Submodel {
    /// Directory name under both the source pipeline and the output.
    pub name: &'static str,
    /// How it is packaged.
    pub plan: SubmodelPlan,
}

fn copy_dir(name: &'static str) -> Submodel {
    Submodel {
        name,
        plan: SubmodelPlan::CopyDir { ignore: Vec::new() },
    }
}

fn copy_dir_filtered(name: &'static str, ignore: &[&'static str]) -> Submodel {
    Submodel {
        name,
        plan: SubmodelPlan::CopyDir {
            ignore: ignore.to_vec(),
        },
    }
}

fn graph(name: &'static str, plan: GraphPlan) -> Submodel {
    Submodel {
        name,
        plan: SubmodelPlan::Graph(plan),
    }
}

fn t(name: &str, elem_type: ElementType, dims: &[Dim]) -> TensorSpec {
    TensorSpec::tensor(name, elem_type, dims)
}

fn f16(name: &str, dims: &[Dim]) -> TensorSpec {
    t(name, ElementType::Float16, dims)
}

fn ids(name: &str, dims: &[Dim]) -> TensorSpec {
    t(name, ElementType::Int32, dims)
}

impl ModelFamily {
    /// Human-readable name for banners.
    pub fn title(&self) -> &'static str {
        match self {
            Self::StableDiffusion => "Stable Diffusion",
            Self::StableDiffusionXl => "Stable Diffusion XL",
            Self::StableDiffusion3 => "Stable Diffusion 3",
            Self::StableCascade => "Stable Cascade",
            Self::Flux => "Flux",
            Self::Wan => "Wan",
            Self::HunyuanVideo => "Hunyuan Video",
            Self::LtxVideo => "LTX Video",
            Self::CogVideoX => "CogVideoX",
            Self::PixArtSigma => "PixArt Sigma",
            Self::ControlNet => "ControlNet",
        }
    }

    /// The family's shape constants.
    pub fn shape_config(&self) -> ShapeConfig {
        let base = ShapeConfig::default();
        match self {
            Self::StableDiffusion | Self::ControlNet => base,
            Self::StableDiffusionXl => ShapeConfig {
                vae_sample_size: 1024,
                unet_sample_size: 128,
                cross_attention_dim: 2048,
                ..base
            },
            Self::StableDiffusion3 | Self::Flux => ShapeConfig {
                vae_sample_size: 1024,
                unet_sample_size: 128,
                latent_channels: 16,
                cross_attention_dim: 4096,
                ..base
            },
            Self::PixArtSigma => ShapeConfig {
                vae_sample_size: 1024,
                unet_sample_size: 128,
                cross_attention_dim: 4096,
                text_sequence: 300,
                ..base
            },
            // Video pipelines pin their extents per submodel.
            Self::StableCascade
            | Self::Wan
            | Self::HunyuanVideo
            | Self::LtxVideo
            | Self::CogVideoX => base,
        }
    }

    /// The module list converted when `--modules` is not given.
    pub fn default_modules(&self) -> Vec<&'static str> {
        self.submodels(&self.shape_config())
            .iter()
            .map(|submodel| submodel.name)
            .collect()
    }

    /// Look up one submodel by name.
    pub fn submodel(&self, config: &ShapeConfig, name: &str) -> Option<Submodel> {
        self.submodels(config)
            .into_iter()
            .find(|submodel| submodel.name == name)
    }

    /// All submodels of the family, in conversion order.
    pub fn submodels(&self, config: &ShapeConfig) -> Vec<Submodel> {
        match self {
            Self::StableDiffusion => stable_diffusion(config),
            Self::StableDiffusionXl => stable_diffusion_xl(config),
            Self::StableDiffusion3 => stable_diffusion_3(config),
            Self::StableCascade => stable_cascade(config),
            Self::Flux => flux(config),
            Self::Wan => wan(config),
            Self::HunyuanVideo => hunyuan_video(config),
            Self::LtxVideo => ltx_video(config),
            Self::CogVideoX => cog_video_x(config),
            Self::PixArtSigma => pix_art_sigma(config),
            Self::ControlNet => controlnet(config),
        }
    }
}

fn clip_text_encoder(config: &ShapeConfig, hidden: i64) -> GraphPlan {
    GraphPlan::plain(
        vec![ids("input_ids", &[BATCH, Fixed(config.token_length)])],
        vec![
            f16(
                "last_hidden_state",
                &[BATCH, Fixed(config.token_length), Fixed(hidden)],
            ),
            f16("pooler_output", &[BATCH, Fixed(hidden)]),
        ],
    )
}

fn vae_encoder(config: &ShapeConfig) -> GraphPlan {
    GraphPlan::plain(
        vec![f16(
            "sample",
            &[
                BATCH,
                Fixed(3),
                Fixed(config.vae_sample_size),
                Fixed(config.vae_sample_size),
            ],
        )],
        vec![f16(
            "latent_sample",
            &[
                BATCH,
                Fixed(config.latent_channels),
                Fixed(config.unet_sample_size),
                Fixed(config.unet_sample_size),
            ],
        )],
    )
}

fn vae_decoder(config: &ShapeConfig) -> GraphPlan {
    GraphPlan::plain(
        vec![f16(
            "latent_sample",
            &[
                BATCH,
                Fixed(config.latent_channels),
                Fixed(config.unet_sample_size),
                Fixed(config.unet_sample_size),
            ],
        )],
        vec![f16(
            "sample",
            &[
                BATCH,
                Fixed(3),
                Fixed(config.vae_sample_size),
                Fixed(config.vae_sample_size),
            ],
        )],
    )
}

fn latent(config: &ShapeConfig) -> Vec<Dim> {
    vec![
        BATCH,
        Fixed(config.latent_channels),
        Fixed(config.unet_sample_size),
        Fixed(config.unet_sample_size),
    ]
}

fn stable_diffusion(config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        copy_dir("tokenizer"),
        graph("text_encoder", clip_text_encoder(config, 768)),
        graph("vae_encoder", vae_encoder(config)),
        graph("vae_decoder", vae_decoder(config)),
        graph(
            "unet",
            GraphPlan::plain(
                vec![
                    f16("sample", &latent(config)),
                    f16("timestep", &[BATCH]),
                    f16(
                        "encoder_hidden_states",
                        &[
                            BATCH,
                            Fixed(config.token_length),
                            Fixed(config.cross_attention_dim),
                        ],
                    ),
                ],
                vec![f16("out_sample", &latent(config))],
            ),
        ),
    ]
}

fn stable_diffusion_xl(config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        copy_dir("tokenizer"),
        copy_dir("tokenizer_2"),
        graph("text_encoder", clip_text_encoder(config, 768)),
        graph("text_encoder_2", clip_text_encoder(config, 1280)),
        graph("vae_encoder", vae_encoder(config)),
        graph("vae_decoder", vae_decoder(config)),
        graph(
            "unet",
            GraphPlan::plain(
                vec![
                    f16("sample", &latent(config)),
                    f16("timestep", &[BATCH]),
                    f16(
                        "encoder_hidden_states",
                        &[
                            BATCH,
                            Fixed(config.token_length),
                            Fixed(config.cross_attention_dim),
                        ],
                    ),
                    f16("text_embeds", &[Fixed(1), Fixed(config.text_embeds_size)]),
                    f16("time_ids", &[Fixed(1), Fixed(config.time_ids_size)]),
                ],
                vec![f16("out_sample", &latent(config))],
            ),
        ),
    ]
}

fn stable_diffusion_3(config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        copy_dir("tokenizer"),
        copy_dir("tokenizer_2"),
        copy_dir("tokenizer_3"),
        graph("text_encoder", clip_text_encoder(config, 768)),
        graph("text_encoder_2", clip_text_encoder(config, 1280)),
        graph(
            "text_encoder_3",
            GraphPlan::plain(
                vec![ids("input_ids", &[BATCH, Fixed(config.text_sequence)])],
                vec![f16(
                    "last_hidden_state",
                    &[BATCH, Fixed(config.text_sequence), Fixed(4096)],
                )],
            ),
        ),
        graph("vae_encoder", vae_encoder(config)),
        graph("vae_decoder", vae_decoder(config)),
        graph(
            "transformer",
            GraphPlan::plain(
                vec![
                    f16("hidden_states", &latent(config)),
                    f16("timestep", &[BATCH]),
                    f16(
                        "encoder_hidden_states",
                        &[
                            BATCH,
                            Fixed(config.token_length),
                            Fixed(config.cross_attention_dim),
                        ],
                    ),
                    f16("pooled_projections", &[Fixed(1), Fixed(2048)]),
                ],
                vec![f16("out_sample", &latent(config))],
            ),
        ),
    ]
}

fn stable_cascade(config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        copy_dir("tokenizer"),
        graph(
            "text_encoder",
            GraphPlan::plain(
                vec![
                    ids("input_ids", &[BATCH, Fixed(config.token_length)]),
                    ids("attention_mask", &[BATCH, Fixed(config.token_length)]),
                ],
                vec![f16(
                    "last_hidden_state",
                    &[BATCH, Fixed(config.token_length), Fixed(1280)],
                )],
            ),
        ),
        graph(
            "vae_encoder",
            GraphPlan::plain(
                vec![f16("sample", &[BATCH, Fixed(3), Fixed(224), Fixed(224)])],
                vec![f16("latent_sample", &[BATCH, Fixed(16), Fixed(24), Fixed(24)])],
            ),
        ),
        graph(
            "vae_decoder",
            GraphPlan::plain(
                vec![f16("sample", &[BATCH, Fixed(4), Fixed(256), Fixed(256)])],
                vec![f16("out_sample", &[BATCH, Fixed(3), Any, Any])],
            ),
        ),
        graph(
            "prior",
            GraphPlan::plain(
                vec![
                    f16("sample", &[BATCH, Fixed(16), Fixed(24), Fixed(24)]),
                    f16("timestep_ratio", &[BATCH]),
                    f16("clip_text_pooled", &[BATCH, Fixed(1), Fixed(1280)]),
                    f16("clip_text", &[BATCH, Fixed(config.token_length), Fixed(1280)]),
                    f16("clip_img", &[BATCH, Fixed(1), Fixed(768)]),
                ],
                vec![f16("out_sample", &[BATCH, Fixed(16), Fixed(24), Fixed(24)])],
            ),
        ),
        graph(
            "decoder",
            GraphPlan::plain(
                vec![
                    f16("sample", &[BATCH, Fixed(4), Fixed(256), Fixed(256)]),
                    f16("timestep_ratio", &[BATCH]),
                    f16("clip_text_pooled", &[BATCH, Fixed(1), Fixed(1280)]),
                    f16("effnet", &[BATCH, Fixed(16), Fixed(24), Fixed(24)]),
                ],
                vec![f16("out_sample", &[BATCH, Fixed(4), Fixed(256), Fixed(256)])],
            ),
        ),
    ]
}

fn flux(config: &ShapeConfig) -> Vec<Submodel> {
    let ignore = &["tokenizer_config.json"];
    vec![
        copy_dir_filtered("tokenizer", ignore),
        copy_dir_filtered("tokenizer_2", ignore),
        graph("text_encoder", clip_text_encoder(config, 768)),
        graph(
            "text_encoder_2",
            GraphPlan::plain(
                vec![ids("input_ids", &[BATCH, Fixed(config.text_sequence)])],
                vec![f16(
                    "last_hidden_state",
                    &[BATCH, Fixed(config.text_sequence), Fixed(4096)],
                )],
            ),
        ),
        graph("vae_encoder", vae_encoder(config)),
        graph("vae_decoder", vae_decoder(config)),
        graph(
            "transformer",
            GraphPlan {
                inputs: vec![
                    f16("hidden_states", &[Fixed(1), Fixed(4096), Fixed(64)]),
                    f16(
                        "encoder_hidden_states",
                        &[Fixed(1), Fixed(config.text_sequence), Fixed(4096)],
                    ),
                    f16("pooled_projections", &[Fixed(1), Fixed(768)]),
                    f16("timestep", &[Fixed(1)]),
                    f16("img_ids", &[Fixed(4096), Fixed(3)]),
                    f16("txt_ids", &[Fixed(config.text_sequence), Fixed(3)]),
                    f16("guidance", &[Fixed(1)]),
                ],
                outputs: vec![f16("out_sample", &[Fixed(1), Fixed(4096), Fixed(64)])],
                normalize_io: false,
                // The rotary embedding contraction overflows float16.
                precision_rules: vec![PrecisionRule::rope_f64("/pos_embed/")],
            },
        ),
    ]
}

fn wan(config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        copy_dir("tokenizer"),
        graph(
            "text_encoder",
            GraphPlan::plain(
                vec![ids("input_ids", &[BATCH, Fixed(config.text_sequence)])],
                vec![f16(
                    "last_hidden_state",
                    &[BATCH, Fixed(config.text_sequence), Fixed(4096)],
                )],
            ),
        ),
        graph(
            "vae_decoder",
            GraphPlan::plain(
                vec![f16(
                    "latent_sample",
                    &[Fixed(1), Fixed(16), Fixed(21), Fixed(60), Fixed(104)],
                )],
                vec![f16("sample", &[Fixed(1), Fixed(3), Any, Any, Any])],
            ),
        ),
        graph(
            "transformer",
            GraphPlan::plain(
                vec![
                    f16(
                        "hidden_states",
                        &[Fixed(1), Fixed(16), Fixed(21), Fixed(60), Fixed(104)],
                    ),
                    f16("timestep", &[Fixed(1)]),
                    f16(
                        "encoder_hidden_states",
                        &[Fixed(1), Fixed(config.text_sequence), Fixed(4096)],
                    ),
                ],
                vec![f16(
                    "out_sample",
                    &[Fixed(1), Fixed(16), Fixed(21), Fixed(60), Fixed(104)],
                )],
            ),
        ),
    ]
}

fn hunyuan_video(_config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        graph(
            "vae_decoder",
            GraphPlan::plain(
                vec![f16(
                    "latent_sample",
                    &[BATCH, Fixed(128), Fixed(21), Fixed(15), Fixed(22)],
                )],
                vec![f16("sample", &[BATCH, Fixed(3), Any, Any, Any])],
            ),
        ),
        graph(
            "transformer",
            GraphPlan::plain(
                vec![
                    f16(
                        "hidden_states",
                        &[BATCH, Fixed(16), Fixed(16), Fixed(40), Fixed(64)],
                    ),
                    t("timestep", ElementType::Int32, &[Fixed(1)]),
                    f16("encoder_hidden_states", &[BATCH, Fixed(256), Fixed(4096)]),
                    f16("encoder_attention_mask", &[BATCH, Fixed(256)]),
                    f16("pooled_projections", &[BATCH, Fixed(768)]),
                    t("guidance", ElementType::Int32, &[Fixed(1)]),
                ],
                vec![f16(
                    "out_sample",
                    &[BATCH, Fixed(16), Fixed(16), Fixed(40), Fixed(64)],
                )],
            ),
        ),
    ]
}

fn ltx_video(_config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        graph(
            "vae_decoder",
            GraphPlan::plain(
                vec![f16(
                    "latent_sample",
                    &[BATCH, Fixed(128), Fixed(21), Fixed(15), Fixed(22)],
                )],
                vec![f16("sample", &[BATCH, Fixed(3), Any, Any, Any])],
            ),
        ),
        graph(
            "transformer",
            GraphPlan::plain(
                vec![
                    f16("hidden_states", &[BATCH, Fixed(6930), Fixed(128)]),
                    f16("encoder_hidden_states", &[BATCH, Fixed(128), Fixed(4096)]),
                    f16("encoder_attention_mask", &[BATCH, Fixed(128)]),
                    f16("timestep", &[BATCH]),
                ],
                vec![f16("out_sample", &[BATCH, Fixed(6930), Fixed(128)])],
            ),
        ),
    ]
}

fn cog_video_x(_config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        graph(
            "vae_decoder",
            GraphPlan::plain(
                vec![f16(
                    "latent_sample",
                    &[BATCH, Fixed(16), Fixed(16), Fixed(60), Fixed(90)],
                )],
                vec![f16("sample", &[BATCH, Fixed(3), Any, Any, Any])],
            ),
        ),
        graph(
            "transformer",
            GraphPlan::plain(
                vec![
                    f16(
                        "hidden_states",
                        &[Fixed(1), Fixed(13), Fixed(16), Fixed(60), Fixed(90)],
                    ),
                    f16("encoder_hidden_states", &[Fixed(1), Fixed(226), Fixed(4096)]),
                    f16("timestep", &[Fixed(1)]),
                ],
                vec![f16(
                    "out_sample",
                    &[Fixed(1), Fixed(13), Fixed(16), Fixed(60), Fixed(90)],
                )],
            ),
        ),
    ]
}

fn pix_art_sigma(config: &ShapeConfig) -> Vec<Submodel> {
    vec![
        copy_dir("tokenizer"),
        graph(
            "text_encoder",
            GraphPlan::plain(
                vec![ids("input_ids", &[BATCH, Fixed(config.text_sequence)])],
                vec![f16(
                    "last_hidden_state",
                    &[BATCH, Fixed(config.text_sequence), Fixed(4096)],
                )],
            ),
        ),
        graph("vae_encoder", vae_encoder(config)),
        graph("vae_decoder", vae_decoder(config)),
        graph(
            "transformer",
            GraphPlan::plain(
                vec![
                    f16("hidden_states", &latent(config)),
                    f16(
                        "encoder_hidden_states",
                        &[
                            BATCH,
                            Fixed(config.text_sequence),
                            Fixed(config.cross_attention_dim),
                        ],
                    ),
                    f16("encoder_attention_mask", &[BATCH, Fixed(config.text_sequence)]),
                    f16("timestep", &[BATCH]),
                ],
                vec![f16("out_sample", &latent(config))],
            ),
        ),
    ]
}

fn controlnet(config: &ShapeConfig) -> Vec<Submodel> {
    let mut outputs: Vec<TensorSpec> = (0..12)
        .map(|i| {
            f16(
                &format!("down_block_{i}_additional_residual"),
                &[BATCH, Any, Any, Any],
            )
        })
        .collect();
    outputs.push(f16("mid_block_additional_residual", &[BATCH, Any, Any, Any]));

    vec![graph(
        "controlnet",
        GraphPlan {
            inputs: vec![
                f16("sample", &latent(config)),
                f16("timestep", &[BATCH]),
                f16(
                    "encoder_hidden_states",
                    &[
                        BATCH,
                        Fixed(config.token_length),
                        Fixed(config.cross_attention_dim),
                    ],
                ),
                f16(
                    "controlnet_cond",
                    &[
                        BATCH,
                        Fixed(3),
                        Fixed(config.vae_sample_size),
                        Fixed(config.vae_sample_size),
                    ],
                ),
                f16("conditioning_scale", &[]),
            ],
            outputs,
            // Hosts feed ControlNet through a float32 surface.
            normalize_io: true,
            precision_rules: Vec::new(),
        },
    )]
}
