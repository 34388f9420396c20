//! Project/font registry service.
//!
//! # Responsibility
//! - Create and look up projects and fonts.
//! - Maintain project designers, font metadata and export flags.
//!
//! # Invariants
//! - Project slugs and repository urls are globally unique; font slugs are
//!   unique within a project.
//! - Export stamps stay monotonic: completion never precedes start.
//! - Every update moves `updated_at` forward and is written only if the row
//!   is unchanged since it was read; a lost race is `WriteConflict`.

use crate::model::actor::Actor;
use crate::model::container::{slugify, ExportState, Font, FontId, Project, ProjectId};
use crate::repo::container_repo::ContainerRepository;
use crate::service::error::{ContainerError, ContainerResult};
use crate::time::now_epoch_ms;
use log::info;

/// Project or font whose export flags are being updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    Project(ProjectId),
    Font(FontId),
}

/// Partial font metadata update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontMetadataUpdate {
    pub fontlib: Option<serde_json::Value>,
    pub features: Option<String>,
    pub designspace: Option<serde_json::Value>,
}

/// Container registry facade.
pub struct ContainerService<R: ContainerRepository> {
    repo: R,
}

impl<R: ContainerRepository> ContainerService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a project; `creator` becomes its first designer.
    ///
    /// # Errors
    /// - `InvalidName` when the name has no slug characters.
    /// - `NameTaken` when the slug or repository url is in use.
    pub fn create_project(
        &self,
        name: &str,
        repo_url: &str,
        creator: &Actor,
    ) -> ContainerResult<Project> {
        if !creator.is_valid() {
            return Err(ContainerError::InvalidActor);
        }
        let name = normalize_name(name)?;
        let repo_url = repo_url.trim();
        if repo_url.is_empty() {
            return Err(ContainerError::InvalidName);
        }

        let mut project = Project::new(name, repo_url);
        if self.repo.find_project_by_slug(&project.slug)?.is_some() {
            return Err(ContainerError::NameTaken(project.slug));
        }
        if self.repo.find_project_by_repo_url(repo_url)?.is_some() {
            return Err(ContainerError::NameTaken(repo_url.to_string()));
        }

        let now = now_epoch_ms();
        project.created_at = now;
        project.updated_at = now;
        project.designers = vec![creator.id.clone()];
        self.repo.create_project(&project)?;
        info!(
            "event=project_create module=service status=ok project_id={}",
            project.id
        );
        Ok(project)
    }

    pub fn get_project(&self, id: ProjectId) -> ContainerResult<Project> {
        self.repo
            .get_project(id)?
            .ok_or(ContainerError::ProjectNotFound(id))
    }

    pub fn list_projects(&self) -> ContainerResult<Vec<Project>> {
        Ok(self.repo.list_projects()?)
    }

    /// Creates a font inside an existing project.
    pub fn create_font(&self, project_id: ProjectId, name: &str) -> ContainerResult<Font> {
        let name = normalize_name(name)?;
        self.get_project(project_id)?;

        let mut font = Font::new(project_id, name);
        if self
            .repo
            .find_font_by_slug(project_id, &font.slug)?
            .is_some()
        {
            return Err(ContainerError::NameTaken(font.slug));
        }

        let now = now_epoch_ms();
        font.created_at = now;
        font.updated_at = now;
        self.repo.create_font(&font)?;
        info!(
            "event=font_create module=service status=ok project_id={} font_id={}",
            project_id, font.id
        );
        Ok(font)
    }

    pub fn get_font(&self, id: FontId) -> ContainerResult<Font> {
        self.repo.get_font(id)?.ok_or(ContainerError::FontNotFound(id))
    }

    pub fn list_fonts(&self, project_id: ProjectId) -> ContainerResult<Vec<Font>> {
        self.get_project(project_id)?;
        Ok(self.repo.list_fonts(project_id)?)
    }

    /// Returns whether the designer set changed.
    pub fn add_designer(&self, project_id: ProjectId, actor_id: &str) -> ContainerResult<bool> {
        let actor_id = normalize_actor(actor_id)?;
        self.get_project(project_id)?;
        Ok(self.repo.add_designer(project_id, actor_id)?)
    }

    pub fn remove_designer(&self, project_id: ProjectId, actor_id: &str) -> ContainerResult<bool> {
        let actor_id = normalize_actor(actor_id)?;
        self.get_project(project_id)?;
        Ok(self.repo.remove_designer(project_id, actor_id)?)
    }

    pub fn is_designer(&self, project_id: ProjectId, actor_id: &str) -> ContainerResult<bool> {
        let project = self.get_project(project_id)?;
        Ok(project
            .designers
            .iter()
            .any(|designer| designer == actor_id.trim()))
    }

    pub fn set_export_enabled(&self, target: ExportTarget, enabled: bool) -> ContainerResult<ExportState> {
        self.update_export(target, |export| {
            export.export_enabled = enabled;
            Ok(())
        })
    }

    /// Marks an export run as started at `at` (epoch ms).
    pub fn mark_export_started(&self, target: ExportTarget, at: i64) -> ContainerResult<ExportState> {
        self.update_export(target, |export| {
            export.mark_started(at);
            Ok(())
        })
    }

    /// Marks the running export as completed; `full` also stamps
    /// `last_full_export_at`.
    ///
    /// # Errors
    /// - `NonMonotonicExport` when `at` precedes the recorded start.
    pub fn mark_export_completed(
        &self,
        target: ExportTarget,
        at: i64,
        full: bool,
    ) -> ContainerResult<ExportState> {
        self.update_export(target, |export| Ok(export.mark_completed(at, full)?))
    }

    pub fn set_font_available(&self, font_id: FontId, available: bool) -> ContainerResult<Font> {
        self.update_font(font_id, |font| {
            font.available = available;
            Ok(())
        })
    }

    /// Replaces the opaque font metadata fields present in `update`.
    pub fn set_font_metadata(
        &self,
        font_id: FontId,
        update: FontMetadataUpdate,
    ) -> ContainerResult<Font> {
        self.update_font(font_id, |font| {
            if let Some(fontlib) = update.fontlib {
                font.fontlib = fontlib;
            }
            if let Some(features) = update.features {
                font.features = features;
            }
            if let Some(designspace) = update.designspace {
                font.designspace = designspace;
            }
            Ok(())
        })
    }

    fn update_export(
        &self,
        target: ExportTarget,
        apply: impl FnOnce(&mut ExportState) -> ContainerResult<()>,
    ) -> ContainerResult<ExportState> {
        match target {
            ExportTarget::Project(id) => {
                let mut project = self.get_project(id)?;
                let read_at = project.updated_at;
                apply(&mut project.export)?;
                project.updated_at = next_stamp(read_at);
                self.repo.update_project(&project, read_at)?;
                Ok(project.export)
            }
            ExportTarget::Font(id) => {
                let font = self.update_font(id, |font| apply(&mut font.export))?;
                Ok(font.export)
            }
        }
    }

    /// Read-modify-write of one font, guarded by its `updated_at`.
    fn update_font(
        &self,
        font_id: FontId,
        apply: impl FnOnce(&mut Font) -> ContainerResult<()>,
    ) -> ContainerResult<Font> {
        let mut font = self.get_font(font_id)?;
        let read_at = font.updated_at;
        apply(&mut font)?;
        font.updated_at = next_stamp(read_at);
        self.repo.update_font(&font, read_at)?;
        Ok(font)
    }
}

/// Current time, but always past `previous` so each write is observable.
fn next_stamp(previous: i64) -> i64 {
    now_epoch_ms().max(previous.saturating_add(1))
}

fn normalize_name(value: &str) -> ContainerResult<&str> {
    let trimmed = value.trim();
    if slugify(trimmed).is_empty() {
        return Err(ContainerError::InvalidName);
    }
    Ok(trimmed)
}

fn normalize_actor(value: &str) -> ContainerResult<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ContainerError::InvalidActor);
    }
    Ok(trimmed)
}
