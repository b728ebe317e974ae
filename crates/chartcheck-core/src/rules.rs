//! Semantic business rules that span fields or look beyond the manifest

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Component, Path, PathBuf};

use crate::chart::TEMPLATES_DIR;
use crate::error::{Result, SemanticViolation};
use crate::manifest::{Manifest, Upload};
use crate::resource::RenderedResource;

pub const SUPPORTED_ARCHITECTURES: &[&str] = &[
    "amd64",
    "arm32v5",
    "arm32v6",
    "arm32v7",
    "arm64v8",
    "i386",
    "ppc64le",
    "s390x",
    "mips64le",
    "riscv64",
    "windows-amd64",
    "arm64",
];

pub const VALID_CATEGORIES: &[&str] = &[
    "AI",
    "Blockchain",
    "Creativity",
    "Developer Tools",
    "Entertainment",
    "Fun",
    "Learning",
    "Lifestyle",
    "Productivity",
    "Social Network",
    "Utilities",
];

pub const RESERVED_FOLDER_NAMES: &[&str] = &[
    "user",
    "system",
    "space",
    "default",
    "os",
    "kubesphere",
    "kube",
    "kubekey",
    "kubernetes",
    "gpu",
    "tapr",
    "bfl",
    "bytetrade",
    "project",
    "pod",
];

static APP_DATA_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\.Values|\bvalues)\.userspace\.appdata").expect("app data regex is valid")
});

/// Entrance names must be unique; reports the index of the first repeat
pub fn check_entrances(manifest: &Manifest) -> std::result::Result<(), SemanticViolation> {
    let mut seen = HashSet::new();
    for (index, entrance) in manifest.entrances.iter().enumerate() {
        if !seen.insert(entrance.name.as_str()) {
            return Err(SemanticViolation::DuplicateEntrance { index });
        }
    }
    Ok(())
}

pub fn check_architecture(manifest: &Manifest) -> std::result::Result<(), SemanticViolation> {
    let arches = &manifest.spec.support_arch;
    if arches.is_empty() {
        return Err(SemanticViolation::EmptyArchitecture);
    }
    match arches
        .iter()
        .find(|a| !SUPPORTED_ARCHITECTURES.contains(&a.as_str()))
    {
        Some(arch) => Err(SemanticViolation::UnsupportedArchitecture { arch: arch.clone() }),
        None => Ok(()),
    }
}

pub fn check_categories(manifest: &Manifest) -> std::result::Result<(), SemanticViolation> {
    let categories = &manifest.metadata.categories;
    if categories
        .iter()
        .all(|c| VALID_CATEGORIES.contains(&c.as_str()))
    {
        return Ok(());
    }
    Err(SemanticViolation::InvalidCategories {
        categories: categories.clone(),
        allowed: VALID_CATEGORIES.iter().map(|c| c.to_string()).collect(),
    })
}

pub fn is_reserved_folder_name(name: &str) -> bool {
    RESERVED_FOLDER_NAMES
        .iter()
        .any(|w| w.eq_ignore_ascii_case(name))
}

pub fn check_reserved_folder_name(folder: &str) -> std::result::Result<(), SemanticViolation> {
    if is_reserved_folder_name(folder) {
        return Err(SemanticViolation::ReservedFolderName {
            name: folder.to_string(),
        });
    }
    Ok(())
}

/// Templates may only reference the app data path when the manifest asks for it
///
/// This is a textual scan of the unrendered templates, line by line. Files are
/// visited in sorted path order and the first offending one is reported.
pub fn check_app_data(root: &Path, manifest: &Manifest) -> Result<()> {
    if manifest.permission.app_data {
        return Ok(());
    }

    let templates = root.join(TEMPLATES_DIR);
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&templates)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();

    for path in files {
        let reader = std::io::BufReader::new(std::fs::File::open(&path)?);
        for line in reader.lines() {
            if APP_DATA_REF.is_match(&line?) {
                let file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return Err(SemanticViolation::AppDataPermission { file }.into());
            }
        }
    }
    Ok(())
}

/// Lexically normalize a path: drop `.`, fold `..`, collapse separators
pub fn clean_path(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// When uploads are configured, a Deployment or StatefulSet must mount the
/// upload destination
pub fn check_upload_mount(
    upload: Option<&Upload>,
    resources: &[RenderedResource],
) -> std::result::Result<(), SemanticViolation> {
    let Some(upload) = upload else {
        return Ok(());
    };

    let dest = clean_path(&upload.dest);
    let mounted = resources
        .iter()
        .filter(|r| r.is_budgeted())
        .flat_map(|r| &r.containers)
        .flat_map(|c| &c.volume_mounts)
        .any(|m| clean_path(m) == dest);

    if mounted {
        Ok(())
    } else {
        Err(SemanticViolation::MissingUploadMount {
            dest: upload.dest.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Entrance;
    use crate::resource::Container;
    use tempfile::TempDir;

    fn with_entrances(names: &[&str]) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.entrances = names
            .iter()
            .map(|n| Entrance {
                name: n.to_string(),
                ..Default::default()
            })
            .collect();
        manifest
    }

    fn with_arch(arch: &[&str]) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.spec.support_arch = arch.iter().map(|a| a.to_string()).collect();
        manifest
    }

    #[test]
    fn test_duplicate_entrance_index() {
        assert!(check_entrances(&with_entrances(&["a", "b"])).is_ok());
        assert_eq!(
            check_entrances(&with_entrances(&["a", "b", "a"])),
            Err(SemanticViolation::DuplicateEntrance { index: 2 })
        );
    }

    #[test]
    fn test_architecture() {
        let err = check_architecture(&with_arch(&[])).unwrap_err();
        assert!(err.to_string().contains("can not be empty"));

        let err = check_architecture(&with_arch(&["amd64", "sparc"])).unwrap_err();
        assert_eq!(err.to_string(), "unsupported arch: sparc");

        assert!(check_architecture(&with_arch(&["amd64", "arm64"])).is_ok());
    }

    #[test]
    fn test_categories() {
        let mut manifest = Manifest::default();
        manifest.metadata.categories = vec!["Utilities".into(), "AI".into()];
        assert!(check_categories(&manifest).is_ok());

        manifest.metadata.categories.push("Games".into());
        let err = check_categories(&manifest).unwrap_err();
        assert!(err.to_string().starts_with(r#"categories ["Utilities", "AI", "Games"] invalid"#));
    }

    #[test]
    fn test_reserved_folder_names() {
        assert!(is_reserved_folder_name("kube"));
        assert!(is_reserved_folder_name("Default"));
        assert!(!is_reserved_folder_name("firefox"));
        assert_eq!(
            check_reserved_folder_name("pod").unwrap_err().to_string(),
            "foldername pod in reserved foldername list, invalid"
        );
    }

    #[test]
    fn test_app_data_scan() {
        let tmp = TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("service.yaml"), "kind: Service\n").unwrap();
        std::fs::write(
            templates.join("deployment.yaml"),
            "volumes:\n- hostPath:\n    path: '{{ .Values.userspace.appdata }}/firefox'\n",
        )
        .unwrap();

        let mut manifest = Manifest::default();
        let err = check_app_data(tmp.path(), &manifest).unwrap_err();
        assert!(err.to_string().starts_with("found .Values.userspace.appdata in deployment.yaml"));

        manifest.permission.app_data = true;
        assert!(check_app_data(tmp.path(), &manifest).is_ok());
    }

    #[test]
    fn test_app_data_scan_reports_first_sorted_file() {
        let tmp = TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        for name in ["zeta.yaml", "alpha.yaml", "mid.yaml"] {
            std::fs::write(templates.join(name), "path: {{ values.userspace.appdata }}\n").unwrap();
        }

        let err = check_app_data(tmp.path(), &Manifest::default()).unwrap_err();
        assert!(err.to_string().contains("in alpha.yaml"));
    }

    #[test]
    fn test_app_data_scan_minijinja_style() {
        let tmp = TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(
            templates.join("sts.yml"),
            "path: {{ values.userspace.appdata }}\n",
        )
        .unwrap();
        // not a yaml file, ignored
        std::fs::write(templates.join("NOTES.txt"), "{{ values.userspace.appdata }}\n").unwrap();

        let err = check_app_data(tmp.path(), &Manifest::default()).unwrap_err();
        assert!(err.to_string().contains("in sts.yml"));
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/data/"), PathBuf::from("/data"));
        assert_eq!(clean_path("/data/./uploads/../"), PathBuf::from("/data"));
        assert_eq!(clean_path("//data//x"), PathBuf::from("/data/x"));
        assert_eq!(clean_path(""), PathBuf::from("."));
        assert_eq!(clean_path("/.."), PathBuf::from("/"));
    }

    #[test]
    fn test_upload_mount() {
        let upload = Upload {
            dest: "/data".into(),
            ..Default::default()
        };
        let deployment = RenderedResource::new("Deployment", "firefox")
            .with_container(Container::new("app").mount("/config"));

        let err = check_upload_mount(Some(&upload), std::slice::from_ref(&deployment)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "can not find volumemount path equal upload Dest: /data"
        );

        let deployment = deployment.with_container(Container::new("files").mount("/data/"));
        assert!(check_upload_mount(Some(&upload), &[deployment]).is_ok());

        assert!(check_upload_mount(None, &[]).is_ok());
    }

    #[test]
    fn test_upload_mount_ignores_daemonsets() {
        let upload = Upload {
            dest: "/data".into(),
            ..Default::default()
        };
        let ds = RenderedResource::new("DaemonSet", "agent")
            .with_container(Container::new("x").mount("/data"));
        assert!(check_upload_mount(Some(&upload), &[ds]).is_err());
    }
}
