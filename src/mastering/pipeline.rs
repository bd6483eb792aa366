use serde::Serialize;
use std::path::{Path, PathBuf};

use super::error::Result;
use super::planner::EqualizationPlanner;
use super::profile::{Profile, ProfileStore};
use super::stage::{
    self, ComputeContext, Computed, ExplicitSettings, SettingsSource, Stage, StageEntry,
    StageSettings,
};
use crate::audio::analysis::SpectralAnalyzer;
use crate::audio::decode;
use crate::audio::effects::{AudioToolkit, BiquadToolkit};
use crate::audio::waveform::Waveform;
use crate::encode::wav;

/// What to run: ordered stages, caller settings and the target profile.
#[derive(Clone, Debug)]
pub struct PipelineSpec {
    pub steps: Vec<Stage>,
    pub settings: ExplicitSettings,
    pub profile: Profile,
    pub automastering: bool,
}

impl PipelineSpec {
    /// Parses every stage name up front so an unknown stage fails before
    /// anything is processed. Unknown profile names fall back to "default".
    pub fn from_names<S: AsRef<str>>(
        steps: &[S],
        settings: ExplicitSettings,
        store: &ProfileStore,
        profile: &str,
        automastering: bool,
    ) -> Result<Self> {
        let steps = steps
            .iter()
            .map(|name| name.as_ref().parse::<Stage>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            steps,
            settings,
            profile: store.resolve(profile).clone(),
            automastering,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PipelineState {
    Idle,
    Running(usize),
    Done,
    Failed(String),
}

/// Progress notifications emitted while a run executes.
#[allow(dead_code)]
#[derive(Debug)]
pub enum StageEvent<'a> {
    /// Settings were derived from the signal by spectral analysis
    AnalysisPerformed { stage: Stage },
    Started {
        index: usize,
        stage: Stage,
        input: &'a Waveform,
        settings: &'a StageSettings,
        source: SettingsSource,
    },
    Finished {
        index: usize,
        stage: Stage,
        output: &'a Waveform,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub source: SettingsSource,
    pub settings: StageSettings,
    /// Samples hard-clipped when the stage output was written
    pub clipped_samples: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: String,
    pub automastering: bool,
    pub stages: Vec<StageReport>,
    pub analysis_runs: usize,
}

/// Runs stages in order, each reading what the previous one wrote.
///
/// Every stage overwrites the same output file. A failing stage aborts the
/// run; outputs already written by earlier stages are left in place.
pub struct MasteringPipeline<T: AudioToolkit = BiquadToolkit> {
    input_path: PathBuf,
    output_path: PathBuf,
    current_input: PathBuf,
    spec: PipelineSpec,
    planner: EqualizationPlanner,
    toolkit: T,
    state: PipelineState,
}

impl MasteringPipeline<BiquadToolkit> {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, spec: PipelineSpec) -> Self {
        Self::with_toolkit(input, output, spec, BiquadToolkit)
    }
}

impl<T: AudioToolkit> MasteringPipeline<T> {
    pub fn with_toolkit(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        spec: PipelineSpec,
        toolkit: T,
    ) -> Self {
        let input_path = input.into();
        Self {
            current_input: input_path.clone(),
            input_path,
            output_path: output.into(),
            spec,
            planner: EqualizationPlanner::default(),
            toolkit,
            state: PipelineState::Idle,
        }
    }

    pub fn with_analyzer(mut self, analyzer: SpectralAnalyzer) -> Self {
        self.planner = EqualizationPlanner::new(analyzer);
        self
    }

    #[allow(dead_code)]
    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    #[allow(dead_code)]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Path the next stage reads from.
    #[allow(dead_code)]
    pub fn current_input(&self) -> &Path {
        &self.current_input
    }

    pub fn run(&mut self) -> Result<RunReport> {
        self.run_with(|_| {})
    }

    pub fn run_with(&mut self, mut on_event: impl FnMut(&StageEvent<'_>)) -> Result<RunReport> {
        let result = self.execute(&mut on_event);
        self.current_input = self.input_path.clone();
        match &result {
            Ok(_) => self.state = PipelineState::Done,
            Err(e) => {
                log::error!("Mastering failed: {}", e);
                self.state = PipelineState::Failed(e.to_string());
            }
        }
        result
    }

    fn execute(&mut self, on_event: &mut dyn FnMut(&StageEvent<'_>)) -> Result<RunReport> {
        let mut report = RunReport {
            input: self.input_path.clone(),
            output: self.output_path.clone(),
            profile: self.spec.profile.name().to_string(),
            automastering: self.spec.automastering,
            stages: Vec::with_capacity(self.spec.steps.len()),
            analysis_runs: 0,
        };

        if self.spec.steps.is_empty() {
            log::warn!("No stages requested; nothing to do");
            return Ok(report);
        }

        let mut input = decode::load(&self.current_input)?;

        // Stages keep the signal's layout, so an input that is analyzable now
        // stays analyzable for every later stage.
        let will_analyze = self.spec.automastering
            && self.spec.steps.iter().any(|s| stage::entry(*s).compute.is_some());
        if will_analyze {
            self.planner.analyzer().validate(&input)?;
        }

        let steps = self.spec.steps.clone();
        for (index, &current) in steps.iter().enumerate() {
            self.state = PipelineState::Running(index);
            let entry = stage::entry(current);

            let (settings, source) = self.resolve_settings(entry, &input)?;
            if source == SettingsSource::Computed {
                report.analysis_runs += 1;
                on_event(&StageEvent::AnalysisPerformed { stage: current });
            }

            log::info!("Applying {} ({} settings)...", current, source);
            on_event(&StageEvent::Started {
                index,
                stage: current,
                input: &input,
                settings: &settings,
                source,
            });

            let output = (entry.apply)(&self.toolkit, &input, &settings)?;

            wav::clear_output(&self.output_path)?;
            let clipped_samples = wav::save(&output, &self.output_path)?;
            on_event(&StageEvent::Finished {
                index,
                stage: current,
                output: &output,
            });
            log::info!("Finished applying {}.", current);

            report.stages.push(StageReport {
                stage: current,
                source,
                settings,
                clipped_samples,
            });

            self.current_input = self.output_path.clone();
            if index + 1 < steps.len() {
                input = decode::load(&self.current_input)?;
            }
        }

        Ok(report)
    }

    /// Computed settings when automastering and the stage supports it,
    /// otherwise explicit settings, otherwise the stage defaults.
    fn resolve_settings(
        &self,
        entry: &StageEntry,
        input: &Waveform,
    ) -> Result<(StageSettings, SettingsSource)> {
        if self.spec.automastering {
            if let Some(compute) = entry.compute {
                let ctx = ComputeContext {
                    input,
                    profile: &self.spec.profile,
                    planner: &self.planner,
                };
                return Ok(match compute(&ctx)? {
                    Computed::Settings(settings) => (settings, SettingsSource::Computed),
                    Computed::NotImplemented(settings) => {
                        log::warn!(
                            "Automatic {} settings are not implemented; using defaults",
                            entry.stage
                        );
                        (settings, SettingsSource::NotImplemented)
                    }
                });
            }
        }
        Ok(stage::resolve(entry.stage, &self.spec.settings))
    }
}
