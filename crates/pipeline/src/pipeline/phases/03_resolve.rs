use crate::interaction::{Choice, Interaction};
use crate::pipeline::context::{Detection, InitContext};
use crate::pipeline::phase_trait::WorkflowPhase;
use anyhow::anyhow;
use async_trait::async_trait;
use pipegen_core::{
    BuilderArtifact, Conflict, InitError, Pairing, ProgressEvent, ProgressHandler, ResolutionSet,
};
use pipegen_stack::ImageRef;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Detected builders that declare the same image. Images already claimed by
/// an explicit artifact are not contested.
pub fn find_conflicts(builders: &[BuilderArtifact]) -> Vec<Conflict> {
    let claimed: HashSet<&str> = builders
        .iter()
        .filter(|b| b.is_explicit())
        .filter_map(|b| b.image.as_deref())
        .collect();

    let mut by_image: BTreeMap<&str, Vec<PathBuf>> = BTreeMap::new();
    for builder in builders.iter().filter(|b| !b.is_explicit()) {
        if let Some(image) = builder.image.as_deref() {
            if !claimed.contains(image) {
                by_image.entry(image).or_default().push(builder.path.clone());
            }
        }
    }

    by_image
        .into_iter()
        .filter_map(|(image, mut paths)| {
            paths.sort();
            paths.dedup();
            (paths.len() > 1).then(|| Conflict {
                image: image.to_string(),
                paths,
            })
        })
        .collect()
}

struct Resolver<'a> {
    builders: &'a [BuilderArtifact],
    used: HashSet<PathBuf>,
    set: ResolutionSet,
    progress: &'a dyn ProgressHandler,
}

impl<'a> Resolver<'a> {
    fn commit(&mut self, artifact: &BuilderArtifact, image: &str) {
        debug!(path = %artifact.path.display(), image, "Committing pairing");
        self.progress.on_progress(&ProgressEvent::PairingCommitted {
            path: artifact.path.clone(),
            image: image.to_string(),
        });
        self.used.insert(artifact.path.clone());
        self.set.pairings.push(Pairing {
            artifact: artifact.clone(),
            image: image.to_string(),
        });
    }

    fn available(&self) -> impl Iterator<Item = &'a BuilderArtifact> + '_ {
        self.builders
            .iter()
            .filter(|b| !b.is_explicit() && !self.used.contains(&b.path))
    }

    /// Builders declaring the image, or failing that, undeclared builders
    /// whose directory is named like it.
    fn candidates(&self, image: &str) -> Vec<&'a BuilderArtifact> {
        let reference = ImageRef::parse(image);
        let declared: Vec<_> = self
            .available()
            .filter(|b| {
                b.image
                    .as_deref()
                    .is_some_and(|d| reference.is_produced_by(d))
            })
            .collect();
        if !declared.is_empty() {
            return declared;
        }

        self.available()
            .filter(|b| {
                b.image.is_none() && b.inferred_name().as_deref() == Some(reference.short_name())
            })
            .collect()
    }
}

/// Pair builders with the images the deploy side references.
///
/// Explicit artifacts are ground truth. Ambiguities go to `interaction`
/// unless `force` is set or nobody can answer, in which case the candidate
/// with the first path wins.
pub fn resolve(
    detection: &Detection,
    force: bool,
    interaction: &mut dyn Interaction,
    progress: &dyn ProgressHandler,
) -> Result<ResolutionSet, InitError> {
    let mut resolver = Resolver {
        builders: &detection.builders,
        used: HashSet::new(),
        set: ResolutionSet {
            deploy_paths: detection.deploy_paths.clone(),
            deploy_source: detection.deploy_source,
            warnings: detection.warnings.clone(),
            ..Default::default()
        },
        progress,
    };
    let deterministic = force || !interaction.is_available();

    for explicit in detection.builders.iter().filter(|b| b.is_explicit()) {
        let image = explicit
            .image
            .clone()
            .ok_or_else(|| anyhow!("Explicit artifact {:?} has no image", explicit.path))?;
        resolver.commit(explicit, &image);
    }

    let conflicts = find_conflicts(&detection.builders);
    if let Some(first) = conflicts.first() {
        if !force {
            return Err(InitError::ConflictingBuilders {
                image: first.image.clone(),
                paths: first.paths.clone(),
            });
        }
    }
    for conflict in &conflicts {
        warn!(
            image = %conflict.image,
            kept = %conflict.paths[0].display(),
            "Several builders declare one image, keeping the first"
        );
        resolver.set.warnings.push(format!(
            "image {} is declared by {} builders; kept {}",
            conflict.image,
            conflict.paths.len(),
            conflict.paths[0].display()
        ));
        resolver.used.extend(conflict.paths.iter().skip(1).cloned());
    }
    resolver.set.conflicts = conflicts;

    for image in &detection.images {
        let reference = ImageRef::parse(image);
        if resolver
            .set
            .pairings
            .iter()
            .any(|p| p.artifact.is_explicit() && reference.is_produced_by(&p.image))
        {
            continue;
        }

        let candidates = resolver.candidates(image);
        match candidates.as_slice() {
            [] => {
                debug!(image = %image, "No builder for image");
                resolver.set.unresolved.push(image.clone());
            }
            [only] => resolver.commit(only, image),
            many => {
                progress.on_progress(&ProgressEvent::Ambiguous {
                    image: image.clone(),
                    candidates: many.len(),
                });
                if deterministic {
                    resolver.set.warnings.push(format!(
                        "image {} matches {} builders; chose {}",
                        image,
                        many.len(),
                        many[0].path.display()
                    ));
                    resolver.commit(many[0], image);
                } else {
                    match interaction.choose(image, many)? {
                        Choice::Builder(idx) => {
                            let chosen = many.get(idx).copied().ok_or_else(|| {
                                anyhow!("Choice {} out of range for image {}", idx, image)
                            })?;
                            resolver.commit(chosen, image);
                        }
                        Choice::Skip => resolver.set.unresolved.push(image.clone()),
                    }
                }
            }
        }
    }

    // A name mismatch is only bridged when someone confirms it
    let leftover: Vec<&BuilderArtifact> = resolver.available().collect();
    if !deterministic
        && leftover.len() == 1
        && leftover[0].image.is_none()
        && resolver.set.unresolved.len() == 1
    {
        let builder = leftover[0];
        let image = resolver.set.unresolved[0].clone();
        if interaction.choose(&image, &[builder])? == Choice::Builder(0) {
            info!(
                path = %builder.path.display(),
                image = %image,
                "Confirmed pairing of the only remaining builder and image"
            );
            resolver.set.unresolved.clear();
            resolver.commit(builder, &image);
        }
    }

    let mut set = resolver.set;
    set.unpaired = detection
        .builders
        .iter()
        .filter(|b| !set.is_paired(&b.path))
        .cloned()
        .collect();

    set.pairings.sort_by(|a, b| {
        (&a.artifact.path, &a.image).cmp(&(&b.artifact.path, &b.image))
    });
    set.unpaired.sort_by(|a, b| a.path.cmp(&b.path));
    set.unresolved.sort();
    Ok(set)
}

pub struct ResolvePhase;

#[async_trait]
impl WorkflowPhase for ResolvePhase {
    fn name(&self) -> &'static str {
        "ResolvePhase"
    }

    async fn execute(&self, context: &mut InitContext) -> Result<(), InitError> {
        let detection = context.detection()?.clone();
        let force = context.config.force;
        let progress = Arc::clone(&context.progress);
        let mut interaction = context
            .interaction
            .take()
            .ok_or_else(|| anyhow!("Interaction channel already taken"))?;

        // Prompts block, so resolution runs off the async workers
        let task = tokio::task::spawn_blocking(move || {
            let result = resolve(&detection, force, interaction.as_mut(), progress.as_ref());
            (result, interaction)
        });

        let (result, interaction) = tokio::select! {
            biased;
            _ = context.cancel.cancelled() => return Err(InitError::Cancelled),
            joined = task => joined.map_err(|e| anyhow!("Resolution task panicked: {}", e))?,
        };
        context.interaction = Some(interaction);
        let set = result?;

        info!(
            pairings = set.pairings.len(),
            unresolved = set.unresolved.len(),
            unpaired = set.unpaired.len(),
            conflicts = set.conflicts.len(),
            "Resolution complete"
        );
        context.resolution = Some(set);
        Ok(())
    }
}
