//! Load → merge → translate → write pipeline.

use crate::checkpoint::{decode_view, Dtype, HfCheckpoint, CONFIG_FILE, TOKENIZER_FILE};
use crate::error::{ConsolidateError, Result};
use crate::export::ExportFormat;
use crate::lora::{merge_into, LoraAdapter};
use crate::params::ModelParams;
use crate::presets::Preset;
use crate::translate::{
    canonical_order, layer_index, reshape_kind, strip_peft_prefix, translate_key, unpermute,
    KeyTranslation, ReshapeKind,
};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Fully resolved export request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    /// Base checkpoint directory (or its `.safetensors` file)
    pub base: PathBuf,
    /// PEFT adapter directory; `None` converts the base model alone
    pub adapter: Option<PathBuf>,
    /// Directory receiving the weights and `params.json`
    pub output_dir: PathBuf,
    /// Fixed hyperparameters; otherwise derived from `config.json`
    pub preset: Option<Preset>,
    pub format: ExportFormat,
    pub dtype: Dtype,
    /// Copy `tokenizer.model` next to the output directory
    pub copy_tokenizer: bool,
}

/// What happens to one base tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorPlan {
    pub source: String,
    /// Consolidated name, `None` when dropped
    pub target: Option<String>,
    pub shape: Vec<usize>,
    pub stored_dtype: Dtype,
    pub merged: bool,
    pub reshape: ReshapeKind,
}

/// Outcome of a successful export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub weights_path: PathBuf,
    pub params_path: PathBuf,
    pub tokenizer_path: Option<PathBuf>,
    pub params: ModelParams,
    pub tensors_written: usize,
    pub tensors_merged: usize,
    pub tensors_skipped: usize,
    pub parameters: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
}

/// Resolve hyperparameters from a preset and/or the base model config.
pub fn resolve_params(preset: Option<Preset>, base: &HfCheckpoint) -> Result<ModelParams> {
    let params = match (preset, base.config()) {
        (Some(preset), Some(config)) => {
            let params = preset.params();
            params.check_consistent(&ModelParams::from_hf_config(config), CONFIG_FILE)?;
            params
        }
        (Some(preset), None) => preset.params(),
        (None, Some(config)) => ModelParams::from_hf_config(config),
        (None, None) => {
            return Err(ConsolidateError::ConfigValue {
                field: "preset".into(),
                message: format!("no {CONFIG_FILE} in {}", base.dir().display()),
                suggestion: format!("Pass --preset ({})", Preset::valid_names()),
            })
        }
    };
    params.validate()?;
    Ok(params)
}

/// Inputs opened and validated once per run.
struct Prepared {
    base: HfCheckpoint,
    adapter: Option<LoraAdapter>,
    params: ModelParams,
    plans: Vec<TensorPlan>,
}

/// Runs an [`ExportPlan`].
pub struct ExportPipeline {
    plan: ExportPlan,
}

impl ExportPipeline {
    pub fn new(plan: ExportPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &ExportPlan {
        &self.plan
    }

    fn prepare(&self) -> Result<Prepared> {
        let base = HfCheckpoint::open(&self.plan.base)?;
        let params = resolve_params(self.plan.preset, &base)?;
        let adapter = self.plan.adapter.as_ref().map(LoraAdapter::load).transpose()?;

        let plans = {
            let st = base.weights().parse()?;
            let mut keys: Vec<String> = st.names().into_iter().map(|k| k.to_string()).collect();
            canonical_order(&mut keys);

            let mut plans = Vec::with_capacity(keys.len());
            for key in keys {
                let view = st.tensor(&key).map_err(|e| ConsolidateError::safetensors(key.clone(), e))?;
                plans.push(plan_tensor(&key, view.shape(), view.dtype(), adapter.as_ref(), &params)?);
            }
            plans
        };

        if let Some(adapter) = &adapter {
            check_all_targets_used(adapter, &plans)?;
        }
        check_layer_count(&plans, &params)?;

        if self.plan.copy_tokenizer && base.tokenizer().is_none() {
            return Err(ConsolidateError::ModelNotFound { path: base.dir().join(TOKENIZER_FILE) });
        }

        Ok(Prepared { base, adapter, params, plans })
    }

    /// Translate every key without writing anything.
    ///
    /// Fails exactly where [`run`](Self::run) would fail on keys and adapter targets.
    pub fn dry_run(&self) -> Result<(ModelParams, Vec<TensorPlan>)> {
        let prepared = self.prepare()?;
        Ok((prepared.params, prepared.plans))
    }

    /// Run the export.
    pub fn run(&self) -> Result<ExportSummary> {
        self.run_with(|_| {})
    }

    /// Run the export, reporting each tensor as it is processed.
    ///
    /// Weights go to a `.partial` file that is renamed only after every
    /// tensor translated; `params.json` is written last.
    pub fn run_with(&self, mut on_tensor: impl FnMut(&TensorPlan)) -> Result<ExportSummary> {
        let started = Instant::now();
        let prepared = self.prepare()?;

        let out_dir = &self.plan.output_dir;
        std::fs::create_dir_all(out_dir)
            .map_err(|e| ConsolidateError::io(format!("creating {}", out_dir.display()), e))?;

        let file_name = self.plan.format.file_name();
        let weights_path = out_dir.join(file_name);
        let partial_path = out_dir.join(format!("{file_name}.partial"));

        let mut summary = ExportSummary {
            weights_path: weights_path.clone(),
            params_path: PathBuf::new(),
            tokenizer_path: None,
            params: prepared.params.clone(),
            tensors_written: 0,
            tensors_merged: 0,
            tensors_skipped: 0,
            parameters: 0,
            bytes_written: 0,
            duration_secs: 0.0,
        };

        if let Err(e) = self.write_weights(&prepared, &partial_path, &mut summary, &mut on_tensor) {
            // Best effort: a failed export leaves no weights behind
            let _ = std::fs::remove_file(&partial_path);
            return Err(e);
        }

        if let Err(e) = std::fs::rename(&partial_path, &weights_path) {
            let _ = std::fs::remove_file(&partial_path);
            return Err(ConsolidateError::io(format!("finalizing {}", weights_path.display()), e));
        }

        summary.params_path = prepared.params.save(out_dir)?;

        if self.plan.copy_tokenizer {
            summary.tokenizer_path = Some(copy_tokenizer(&prepared.base, out_dir)?);
        }

        summary.duration_secs = started.elapsed().as_secs_f64();
        Ok(summary)
    }

    fn write_weights(
        &self,
        prepared: &Prepared,
        path: &Path,
        summary: &mut ExportSummary,
        on_tensor: &mut impl FnMut(&TensorPlan),
    ) -> Result<()> {
        let out_dtype = self.plan.dtype;
        let params = &prepared.params;
        let st = prepared.base.weights().parse()?;

        let file_name = self.plan.format.file_name();
        let archive_name = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
        let mut writer = self.plan.format.create_writer(path, archive_name)?;

        for plan in &prepared.plans {
            on_tensor(plan);
            let Some(target) = &plan.target else {
                summary.tensors_skipped += 1;
                continue;
            };

            let view = st
                .tensor(&plan.source)
                .map_err(|e| ConsolidateError::safetensors(plan.source.clone(), e))?;

            let passthrough =
                !plan.merged && plan.reshape == ReshapeKind::None && plan.stored_dtype == out_dtype;
            let bytes: Cow<'_, [u8]> = if passthrough {
                Cow::Borrowed(view.data())
            } else {
                let mut tensor = decode_view(&plan.source, &view)?;

                let key = strip_peft_prefix(&plan.source);
                if let Some(adapter) = prepared.adapter.as_ref().filter(|_| plan.merged) {
                    if let Some(pair) = adapter.pair(&key) {
                        let config = adapter.config();
                        merge_into(target, &mut tensor, pair, config.scale(), config.fan_in_fan_out)?;
                        summary.tensors_merged += 1;
                    }
                }

                let tensor = match plan.reshape {
                    ReshapeKind::None => tensor,
                    ReshapeKind::QueryHeads => unpermute(target, &tensor, params.n_heads)?,
                    ReshapeKind::KeyValueHeads => unpermute(target, &tensor, params.kv_heads())?,
                };
                Cow::Owned(out_dtype.encode(&tensor.data))
            };

            writer.write_tensor(target, out_dtype, &plan.shape, &bytes)?;
            summary.tensors_written += 1;
            summary.parameters += plan.shape.iter().product::<usize>() as u64;
            summary.bytes_written += bytes.len() as u64;
        }

        writer.finish()
    }
}

fn plan_tensor(
    key: &str,
    shape: &[usize],
    dtype: safetensors::Dtype,
    adapter: Option<&LoraAdapter>,
    params: &ModelParams,
) -> Result<TensorPlan> {
    let target = match translate_key(key)? {
        KeyTranslation::Renamed(target) => Some(target),
        KeyTranslation::Skipped => None,
    };

    let (stored_dtype, merged, reshape) = match &target {
        Some(target) => {
            if let Some(layer) = layer_index(target) {
                if layer >= params.n_layers {
                    return Err(ConsolidateError::ConfigValue {
                        field: "n_layers".into(),
                        message: format!("{key} is layer {layer} but the model has {} layers", params.n_layers),
                        suggestion: "Check the preset or config.json against the checkpoint".into(),
                    });
                }
            }
            let merged = adapter.is_some_and(|a| a.pair(&strip_peft_prefix(key)).is_some());
            (Dtype::from_safetensors(dtype, key)?, merged, reshape_kind(target))
        }
        // Dropped tensors may use any dtype (inv_freq caches are f32, others vary)
        None => (Dtype::from_safetensors(dtype, key).unwrap_or_default(), false, ReshapeKind::None),
    };

    Ok(TensorPlan {
        source: key.to_string(),
        target,
        shape: shape.to_vec(),
        stored_dtype,
        merged,
        reshape,
    })
}

fn check_all_targets_used(adapter: &LoraAdapter, plans: &[TensorPlan]) -> Result<()> {
    let used: BTreeSet<String> = plans
        .iter()
        .filter(|p| p.merged)
        .map(|p| strip_peft_prefix(&p.source))
        .collect();
    let unused: Vec<&str> = adapter.target_keys().filter(|k| !used.contains(*k)).collect();
    if unused.is_empty() {
        Ok(())
    } else {
        Err(ConsolidateError::adapter(format!(
            "adapter targets {} weight(s) missing from the base model: {}",
            unused.len(),
            unused.join(", ")
        )))
    }
}

fn check_layer_count(plans: &[TensorPlan], params: &ModelParams) -> Result<()> {
    let layers: BTreeSet<usize> = plans
        .iter()
        .filter_map(|p| p.target.as_deref().and_then(layer_index))
        .collect();
    if layers.len() != params.n_layers {
        return Err(ConsolidateError::ConfigValue {
            field: "n_layers".into(),
            message: format!(
                "checkpoint has {} layers but params say {}",
                layers.len(),
                params.n_layers
            ),
            suggestion: "Check the preset or config.json against the checkpoint".into(),
        });
    }
    Ok(())
}

/// Copy `tokenizer.model` beside the output directory, where the consolidated
/// runtime looks for it.
fn copy_tokenizer(base: &HfCheckpoint, out_dir: &Path) -> Result<PathBuf> {
    let source = base.tokenizer().ok_or_else(|| ConsolidateError::ModelNotFound {
        path: base.dir().join(TOKENIZER_FILE),
    })?;
    let dest_dir = out_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(out_dir);
    let dest = dest_dir.join(TOKENIZER_FILE);
    std::fs::copy(source, &dest)
        .map_err(|e| ConsolidateError::io(format!("copying tokenizer to {}", dest.display()), e))?;
    Ok(dest)
}
