//! One "AI assist" pass: run every configured detector on the current image
//! and commit the combined result as a single history entry.

use std::path::Path;

use anyhow::bail;
use log::{info, warn};

use crate::controller::{Annotator, Outcome};
use crate::detector::{Detection, DetectorKind, DetectorRegistry};
use crate::model::AnnotationState;
use crate::settings::{DetectorChoice, Settings};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectorFailure {
    pub kind: DetectorKind,
    pub detector: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssistReport {
    pub outcome: Outcome,
    /// Kinds whose category was rewritten, by detection or by clearing.
    pub applied: Vec<DetectorKind>,
    pub failures: Vec<DetectorFailure>,
    /// Configured names with no registered detector.
    pub missing: Vec<(DetectorKind, String)>,
}

impl AssistReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Disabled kinds have their category cleared. A failing detector only
/// loses its own contribution; the rest still land in the one snapshot.
pub fn run_assist(
    annotator: &mut Annotator,
    registry: &DetectorRegistry,
    settings: &Settings,
    image_path: &Path,
) -> AssistReport {
    let mut report = AssistReport::default();

    for kind in DetectorKind::ALL {
        let category = kind.category();
        let name = match settings.detector(kind) {
            DetectorChoice::Disabled => {
                annotator.state_mut().clear_points(category);
                report.applied.push(kind);
                continue;
            }
            DetectorChoice::Named(name) => name,
        };

        let Some(detector) = registry.get(kind, &name) else {
            warn!("no {kind} detector named {name:?}");
            report.missing.push((kind, name));
            continue;
        };

        let result = detector
            .detect(image_path)
            .and_then(|detection| apply(annotator.state_mut(), kind, detection));
        match result {
            Ok(()) => {
                info!("{kind} detector {name:?} applied");
                report.applied.push(kind);
            }
            Err(err) => {
                warn!("{kind} detector {name:?} failed: {err:#}");
                report.failures.push(DetectorFailure {
                    kind,
                    detector: name,
                    message: format!("{err:#}"),
                });
            }
        }
    }

    if report.changed() {
        report.outcome = annotator.commit();
    }
    if let Some(kind) = focus_kind(settings) {
        report.outcome = report.outcome.merge(annotator.set_category(kind.category()));
    }
    report
}

fn apply(
    state: &mut AnnotationState,
    kind: DetectorKind,
    detection: Detection,
) -> anyhow::Result<()> {
    let category = kind.category();
    match (kind, detection) {
        (DetectorKind::Pupil | DetectorKind::Iris, Detection::Ellipse { ellipse, points }) => {
            state.set_ellipse(category, ellipse)?;
            state.set_points(category, points);
        }
        (DetectorKind::Eyelid, Detection::Contour(points)) => {
            state.set_points(category, points);
        }
        (DetectorKind::Eyelid, Detection::Ellipse { .. }) => {
            bail!("eyelid detector returned an ellipse instead of a contour")
        }
        (_, Detection::Contour(_)) => {
            bail!("{kind} detector returned a contour instead of an ellipse")
        }
    }
    Ok(())
}

/// Category to show after a pass: the most specific enabled detector.
fn focus_kind(settings: &Settings) -> Option<DetectorKind> {
    [DetectorKind::Eyelid, DetectorKind::Iris, DetectorKind::Pupil]
        .into_iter()
        .find(|&kind| settings.detector(kind) != DetectorChoice::Disabled)
}
