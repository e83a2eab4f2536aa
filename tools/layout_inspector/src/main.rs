use std::env;
use std::path::Path;

use glam::{Affine3A, Vec3};
use portalis_shared::layout::SceneLayout;
use portalis_shared::portal::{PortalDirection, PortalScene};

const DEFAULT_VIEWER: Vec3 = Vec3::new(0.0, 2.0, 20.0);
const USAGE: &str = "Usage: layout_inspector [layout.toml] [x y z] | --print-default";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--print-default") {
        match SceneLayout::default().to_toml_string() {
            Ok(contents) => print!("{contents}"),
            Err(err) => {
                eprintln!("layout_inspector error: {err}");
                std::process::exit(1);
            }
        }
        return;
    }

    let (path, viewer) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(path.as_deref().map(Path::new), viewer) {
        eprintln!("layout_inspector error: {err}");
        std::process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<(Option<String>, Vec3), String> {
    let parse_viewer = |coords: &[String]| -> Result<Vec3, String> {
        let mut values = [0.0_f32; 3];
        for (value, text) in values.iter_mut().zip(coords) {
            *value = text
                .parse()
                .map_err(|_| format!("invalid viewer coordinate: {text}"))?;
        }
        Ok(Vec3::from_array(values))
    };

    match args.len() {
        0 => Ok((None, DEFAULT_VIEWER)),
        1 => Ok((Some(args[0].clone()), DEFAULT_VIEWER)),
        3 => Ok((None, parse_viewer(args)?)),
        4 => Ok((Some(args[0].clone()), parse_viewer(&args[1..])?)),
        _ => Err("expected a layout path, a viewer position, or both".to_string()),
    }
}

fn run(path: Option<&Path>, viewer_position: Vec3) -> Result<(), String> {
    let layout = match path {
        Some(path) => SceneLayout::load(path).map_err(|err| err.to_string())?,
        None => SceneLayout::default(),
    };
    let scene = layout
        .build_portal_scene()
        .map_err(|err| err.to_string())?;

    match path {
        Some(path) => println!("Layout: {}", path.display()),
        None => println!("Layout: built-in default"),
    }
    println!(
        "Viewer: ({:.3}, {:.3}, {:.3})",
        viewer_position.x, viewer_position.y, viewer_position.z
    );
    println!("Pairs: {}", scene.len());

    for line in describe(&scene, &Affine3A::from_translation(viewer_position)) {
        println!("{line}");
    }

    Ok(())
}

fn describe(scene: &PortalScene, viewer: &Affine3A) -> Vec<String> {
    let mut lines = Vec::new();
    for (id, pair) in scene.pairs() {
        for direction in PortalDirection::ALL {
            let source = pair.surface(direction.source()).placement().center();
            let header = format!(
                "  pair {} {direction:?} (surface @ {:.2}, {:.2}, {:.2})",
                id.0, source.x, source.y, source.z
            );
            match pair.solve(direction, viewer) {
                Ok(camera) => {
                    let frustum = camera.frustum;
                    lines.push(format!(
                        "{header}: camera @ ({:.3}, {:.3}, {:.3}) l={:.3} r={:.3} b={:.3} t={:.3} near={:.3} far={:.1}",
                        camera.position.x,
                        camera.position.y,
                        camera.position.z,
                        frustum.left,
                        frustum.right,
                        frustum.bottom,
                        frustum.top,
                        frustum.near,
                        frustum.far
                    ));
                }
                Err(reason) => lines.push(format!("{header}: skipped ({reason})")),
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use glam::{Affine3A, Vec3};
    use portalis_shared::layout::SceneLayout;

    use super::{describe, parse_args, DEFAULT_VIEWER};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn arguments_select_layout_and_viewer() {
        assert_eq!(parse_args(&[]), Ok((None, DEFAULT_VIEWER)));
        assert_eq!(
            parse_args(&strings(&["rooms.toml"])),
            Ok((Some("rooms.toml".to_string()), DEFAULT_VIEWER))
        );
        assert_eq!(
            parse_args(&strings(&["1", "2.5", "-3"])),
            Ok((None, Vec3::new(1.0, 2.5, -3.0)))
        );
        assert!(parse_args(&strings(&["a.toml", "1", "x", "3"])).is_err());
        assert!(parse_args(&strings(&["a", "b"])).is_err());
    }

    #[test]
    fn default_scene_reports_every_direction() {
        let scene = SceneLayout::default()
            .build_portal_scene()
            .expect("default layout is valid");
        let lines = describe(&scene, &Affine3A::from_translation(DEFAULT_VIEWER));
        assert_eq!(lines.len(), 6);

        // The default viewer stands behind the two side-facing B portals.
        let skipped = lines.iter().filter(|line| line.contains("skipped")).count();
        assert_eq!(skipped, 2);
        assert!(lines[0].contains("pair 0 AToB") && lines[0].contains("camera @"));
    }
}
