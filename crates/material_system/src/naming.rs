//! Material name normalization
//!
//! Registry keys are *unified* names: the same material referenced as
//! `Materials\Rock.mtl` and `materials/rock` resolves to one entry.

/// Material descriptor file extension
pub const MATERIAL_EXTENSION: &str = ".mtl";

/// Reserved name of the no-draw sentinel material and shader
pub const NO_DRAW_NAME: &str = "nodraw";

/// Normalize a path-like material name into its registry key
///
/// Backslashes become forward slashes, repeated separators collapse, the
/// result is lowercased, and leading `./` or `/` and trailing `.mtl` are
/// stripped until none is left. Unifying a unified name returns it as-is.
pub fn unify_name(name: &str) -> String {
    let mut unified = String::with_capacity(name.len());
    let mut last_was_separator = false;

    for c in name.trim().chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' {
            if last_was_separator {
                continue;
            }
            last_was_separator = true;
        } else {
            last_was_separator = false;
        }
        unified.extend(c.to_lowercase());
    }

    let mut unified = unified.as_str();
    loop {
        let stripped = unified.trim().trim_start_matches('/');
        let stripped = stripped.strip_prefix("./").unwrap_or(stripped);
        let stripped = stripped.strip_suffix(MATERIAL_EXTENSION).unwrap_or(stripped);
        if stripped == unified {
            break;
        }
        unified = stripped;
    }

    unified.to_string()
}

/// File name a unified material name is loaded from
///
/// Names that already carry an extension are used as-is.
pub fn material_file_name(unified: &str) -> String {
    if unified.contains('.') {
        unified.to_string()
    } else {
        format!("{unified}{MATERIAL_EXTENSION}")
    }
}

/// Resolve a material name referenced from a geometry file
///
/// Bare names live next to the geometry; names with a folder are game paths.
pub fn resolve_geometry_material(material_name: &str, geometry_path: &str) -> String {
    let material_name = material_name.replace('\\', "/");
    if material_name.contains('/') {
        return material_name.trim_start_matches("./").to_string();
    }

    let geometry_path = geometry_path.replace('\\', "/");
    match geometry_path.rfind('/') {
        Some(pos) => format!("{}/{}", &geometry_path[..pos], material_name),
        None => material_name,
    }
}

/// Whether a texture path carries a drive letter (absolute, machine specific)
pub fn has_drive_letter(texture: &str) -> bool {
    texture.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unify_collapses_case_and_separators() {
        assert_eq!(unify_name("Materials\\Rock"), "materials/rock");
        assert_eq!(unify_name("materials//rock.mtl"), "materials/rock");
        assert_eq!(unify_name("./Materials/ROCK.MTL"), "materials/rock");
        assert_eq!(unify_name("  /materials/rock "), "materials/rock");
        assert_eq!(unify_name("Materials/Rock"), unify_name("materials\\rock.mtl"));
    }

    #[test]
    fn test_unify_is_idempotent() {
        for name in [
            "a.mtl.mtl",
            "/./Materials/Rock",
            "././/a.MTL",
            "materials/rock .mtl",
            "Objects\\Crate.binmtl",
            ".mtl",
        ] {
            let once = unify_name(name);
            assert_eq!(unify_name(&once), once, "{name}");
        }
        assert_eq!(unify_name("a.mtl.mtl"), "a");
        assert_eq!(unify_name("/./Materials/Rock"), "materials/rock");
    }

    #[test]
    fn test_unify_keeps_other_extensions() {
        assert_eq!(unify_name("objects/crate.binmtl"), "objects/crate.binmtl");
    }

    #[test]
    fn test_material_file_name() {
        assert_eq!(material_file_name("materials/rock"), "materials/rock.mtl");
        assert_eq!(material_file_name("objects/crate.binmtl"), "objects/crate.binmtl");
    }

    #[test]
    fn test_resolve_geometry_material() {
        assert_eq!(
            resolve_geometry_material("crate_mat", "objects/props/crate.cgf"),
            "objects/props/crate_mat"
        );
        assert_eq!(
            resolve_geometry_material("materials/shared", "objects/props/crate.cgf"),
            "materials/shared"
        );
        assert_eq!(resolve_geometry_material("loose", "crate.cgf"), "loose");
    }

    #[test]
    fn test_drive_letter_detection() {
        assert!(has_drive_letter("C:/art/rock_diff.tif"));
        assert!(!has_drive_letter("textures/rock_diff.tif"));
    }
}
