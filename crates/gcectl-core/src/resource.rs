//! Resource references
//!
//! A [`ResourceRef`] names one remote object: project, scope, kind and name.
//! It renders to the relative REST path used by the compute API and can be
//! parsed back out of the `selfLink` / `targetLink` URLs the API returns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Sentinel used on the command line and in config for the global scope
pub const GLOBAL_SCOPE: &str = "global";

/// Whether a resource or operation is global to the project or bound to a zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Scope {
    Global,
    Zone(String),
}

impl Scope {
    pub fn zone(name: impl Into<String>) -> Self {
        Scope::Zone(name.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Zone name, if zonal
    pub fn zone_name(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Zone(z) => Some(z),
        }
    }

    /// Path segment(s) for this scope: `global` or `zones/<zone>`
    pub fn path_segment(&self) -> String {
        match self {
            Scope::Global => GLOBAL_SCOPE.to_string(),
            Scope::Zone(z) => format!("zones/{z}"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str(GLOBAL_SCOPE),
            Scope::Zone(z) => f.write_str(z),
        }
    }
}

impl FromStr for Scope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::Validation("scope must not be empty".to_string()));
        }
        if s == GLOBAL_SCOPE {
            Ok(Scope::Global)
        } else {
            // Accept full zone URLs as found in operation documents
            Ok(Scope::Zone(s.rsplit('/').next().unwrap_or(s).to_string()))
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

impl TryFrom<String> for Scope {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kinds of compute resources the workflows touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Disk,
    Snapshot,
    Image,
    InstanceTemplate,
    InstanceGroupManager,
    InstanceGroup,
    Instance,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Disk,
        ResourceKind::Snapshot,
        ResourceKind::Image,
        ResourceKind::InstanceTemplate,
        ResourceKind::InstanceGroupManager,
        ResourceKind::InstanceGroup,
        ResourceKind::Instance,
    ];

    /// REST collection name
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Disk => "disks",
            ResourceKind::Snapshot => "snapshots",
            ResourceKind::Image => "images",
            ResourceKind::InstanceTemplate => "instanceTemplates",
            ResourceKind::InstanceGroupManager => "instanceGroupManagers",
            ResourceKind::InstanceGroup => "instanceGroups",
            ResourceKind::Instance => "instances",
        }
    }

    /// Whether this kind lives at project level rather than in a zone
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            ResourceKind::Snapshot | ResourceKind::Image | ResourceKind::InstanceTemplate
        )
    }

    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.collection() == collection)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Disk => "disk",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::Image => "image",
            ResourceKind::InstanceTemplate => "instance template",
            ResourceKind::InstanceGroupManager => "instance group manager",
            ResourceKind::InstanceGroup => "instance group",
            ResourceKind::Instance => "instance",
        };
        f.write_str(name)
    }
}

/// Immutable reference to a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    project: String,
    scope: Scope,
    kind: ResourceKind,
    name: String,
}

impl ResourceRef {
    pub fn new(
        project: impl Into<String>,
        scope: Scope,
        kind: ResourceKind,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            scope,
            kind,
            name: name.into(),
        }
    }

    /// Reference a project-level resource (snapshot, image, template)
    pub fn global(project: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::new(project, Scope::Global, kind, name)
    }

    /// Reference a zonal resource (disk, instance, group)
    pub fn zonal(
        project: impl Into<String>,
        zone: impl Into<String>,
        kind: ResourceKind,
        name: impl Into<String>,
    ) -> Self {
        Self::new(project, Scope::Zone(zone.into()), kind, name)
    }

    /// The newest image of an image family, resolved server-side
    pub fn image_family(project: impl Into<String>, family: &str) -> Self {
        Self::global(project, ResourceKind::Image, format!("family/{family}"))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relative path of the collection this resource belongs to
    pub fn collection_path(&self) -> String {
        format!(
            "projects/{}/{}/{}",
            self.project,
            self.scope.path_segment(),
            self.kind.collection()
        )
    }

    /// Relative path of the resource itself
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection_path(), self.name)
    }

    /// Parse a `selfLink`, `targetLink` or relative path
    ///
    /// Accepts `https://.../compute/v1/projects/p/zones/z/disks/d` as well as
    /// `projects/p/global/images/i`.
    pub fn from_link(link: &str) -> crate::Result<Self> {
        let relative = relative_link(link);
        let parts: Vec<&str> = relative.split('/').collect();
        let invalid = || CoreError::Validation(format!("unrecognized resource link: {link}"));

        match parts.as_slice() {
            ["projects", project, "global", collection, name] => {
                let kind = ResourceKind::from_collection(collection).ok_or_else(invalid)?;
                Ok(Self::global(*project, kind, *name))
            }
            ["projects", project, "zones", zone, collection, name] => {
                let kind = ResourceKind::from_collection(collection).ok_or_else(invalid)?;
                Ok(Self::zonal(*project, *zone, kind, *name))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Drop the API root from a link, leaving `projects/...`
///
/// Links that do not contain a `projects/` segment are returned unchanged.
pub fn relative_link(link: &str) -> &str {
    if link.starts_with("projects/") {
        return link;
    }
    match link.find("/projects/") {
        Some(idx) => &link[idx + 1..],
        None => link,
    }
}

/// Last path segment of a link, e.g. the template name in an `instanceTemplate` URL
pub fn link_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parsing() {
        assert_eq!("global".parse::<Scope>().unwrap(), Scope::Global);
        assert_eq!(
            "europe-west1-d".parse::<Scope>().unwrap(),
            Scope::zone("europe-west1-d")
        );
        assert_eq!(
            "https://www.googleapis.com/compute/v1/projects/p/zones/z1"
                .parse::<Scope>()
                .unwrap(),
            Scope::zone("z1")
        );
        assert!("".parse::<Scope>().is_err());
    }

    #[test]
    fn test_paths() {
        let disk = ResourceRef::zonal("p", "z1", ResourceKind::Disk, "disk-A");
        assert_eq!(disk.path(), "projects/p/zones/z1/disks/disk-A");

        let template = ResourceRef::global("p", ResourceKind::InstanceTemplate, "t");
        assert_eq!(template.path(), "projects/p/global/instanceTemplates/t");
        assert_eq!(
            template.collection_path(),
            "projects/p/global/instanceTemplates"
        );
    }

    #[test]
    fn test_image_family_path() {
        let image = ResourceRef::image_family("debian-cloud", "debian-12");
        assert_eq!(image.path(), "projects/debian-cloud/global/images/family/debian-12");
    }

    #[test]
    fn test_from_self_link() {
        let r = ResourceRef::from_link(
            "https://www.googleapis.com/compute/v1/projects/p/global/snapshots/disk-A-1-tmp",
        )
        .unwrap();
        assert_eq!(r.kind(), ResourceKind::Snapshot);
        assert_eq!(r.scope(), &Scope::Global);
        assert_eq!(r.name(), "disk-A-1-tmp");

        let r = ResourceRef::from_link("projects/p/zones/z1/instanceGroupManagers/web").unwrap();
        assert_eq!(r.kind(), ResourceKind::InstanceGroupManager);
        assert_eq!(r.scope().zone_name(), Some("z1"));
    }

    #[test]
    fn test_from_link_rejects_unknown_shapes() {
        assert!(ResourceRef::from_link("projects/p/regions/r/subnetworks/s").is_err());
        assert!(ResourceRef::from_link("not a link").is_err());
    }

    #[test]
    fn test_relative_link() {
        assert_eq!(
            relative_link("https://compute.googleapis.com/compute/v1/projects/p/global/snapshots/s"),
            "projects/p/global/snapshots/s"
        );
        assert_eq!(
            relative_link("projects/p/global/snapshots/s"),
            "projects/p/global/snapshots/s"
        );
        assert_eq!(relative_link("global/networks/default"), "global/networks/default");
    }

    #[test]
    fn test_link_name() {
        assert_eq!(
            link_name("https://x/projects/p/global/instanceTemplates/web-v3"),
            "web-v3"
        );
    }
}
