//! Cache-aware artifact generation.
//!
//! Content that cannot be drawn directly is first turned into an image by an
//! external producer. Each class has an ordered list of recipes; the first
//! one whose program is installed and that leaves a non-empty artifact wins.
//! Results go through [`PreviewCache`], so an unchanged source is converted
//! only once.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::cache::{ArtifactFormat, PreviewCache};
use crate::classify::{ContentClass, ImageKind};
use crate::tools::Toolbox;

/// How a producer's output reaches the artifact path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Output {
    /// The producer writes the artifact path itself.
    Direct,
    /// The producer writes into a scratch directory; the named file is moved
    /// into place afterwards.
    Relocate { dir: PathBuf, file: PathBuf },
}

/// One producer invocation.
#[derive(Debug, Clone)]
struct Recipe {
    program: &'static str,
    args: Vec<OsString>,
    output: Output,
}

impl Recipe {
    fn direct(program: &'static str, args: Vec<OsString>) -> Self {
        Self {
            program,
            args,
            output: Output::Direct,
        }
    }
}

/// Builds argv lists piece by piece.
#[derive(Default)]
struct Argv(Vec<OsString>);

impl Argv {
    fn arg(mut self, a: impl Into<OsString>) -> Self {
        self.0.push(a.into());
        self
    }

    fn path(self, p: &Path) -> Self {
        self.arg(p.as_os_str())
    }

    fn done(self) -> Vec<OsString> {
        self.0
    }
}

/// Produces cached artifacts for one session.
pub struct Generator<'a> {
    cache: &'a PreviewCache,
    tools: &'a Toolbox,
    width: u32,
    height: u32,
}

impl<'a> Generator<'a> {
    pub fn new(cache: &'a PreviewCache, tools: &'a Toolbox, width: u32, height: u32) -> Self {
        Self {
            cache,
            tools,
            width,
            height,
        }
    }

    /// Artifact format for a cacheable class, `None` for classes drawn
    /// without conversion.
    pub fn artifact_format(class: ContentClass) -> Option<ArtifactFormat> {
        match class {
            ContentClass::Image(ImageKind::Svg) | ContentClass::Office => Some(ArtifactFormat::Png),
            ContentClass::Image(ImageKind::Generic)
            | ContentClass::Gif
            | ContentClass::Video
            | ContentClass::Audio
            | ContentClass::Font
            | ContentClass::Pdf
            | ContentClass::Epub
            | ContentClass::VectorImage
            | ContentClass::Djvu => Some(ArtifactFormat::Jpg),
            _ => None,
        }
    }

    /// Return a fresh artifact for `source`, generating it on a miss.
    pub fn generate(&self, class: ContentClass, source: &Path) -> Option<PathBuf> {
        let format = Self::artifact_format(class)?;
        self.cache.get_or_generate(source, format, |artifact| {
            let recipes = self.recipes(class, source, artifact);
            self.run_first(&recipes, artifact)
        })
    }

    /// Decompose an animated image into frames, reusing fresh frames.
    pub fn generate_frames(&self, source: &Path) -> Option<PathBuf> {
        if let Some(dir) = self.cache.lookup_frames(source) {
            return Some(dir);
        }
        let dir = self.cache.frames_dir(source);
        let staging = self.cache.frames_staging_dir(source);
        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::remove_dir_all(&staging);
        if let Err(e) = std::fs::create_dir_all(&staging) {
            log::warn!("Cannot create frame dir {}: {}", staging.display(), e);
            return None;
        }

        let mut pattern = staging.join("frame-%04d").into_os_string();
        pattern.push(ArtifactFormat::Jpg.suffix());
        let geometry = format!("{}x{}>", self.width, self.height);
        let recipes: Vec<Recipe> = ["magick", "convert"]
            .into_iter()
            .map(|program| {
                Recipe::direct(
                    program,
                    Argv::default()
                        .path(source)
                        .arg("-coalesce")
                        .arg("-resize")
                        .arg(&geometry)
                        .arg(&pattern)
                        .done(),
                )
            })
            .collect();

        let moved = self
            .run_first(&recipes, &staging)
            .and_then(|()| std::fs::rename(&staging, &dir));
        match moved {
            Ok(()) => Some(dir),
            Err(e) => {
                log::info!("No frames for {}: {}", source.display(), e);
                let _ = std::fs::remove_dir_all(&staging);
                None
            }
        }
    }

    fn recipes(&self, class: ContentClass, source: &Path, artifact: &Path) -> Vec<Recipe> {
        let (w, h) = (self.width, self.height);
        let geometry = format!("{}x{}>", w, h);
        let first_frame = {
            let mut s = source.as_os_str().to_owned();
            s.push("[0]");
            s
        };
        let magick = |program: &'static str| {
            Recipe::direct(
                program,
                Argv::default()
                    .arg(&first_frame)
                    .arg("-flatten")
                    .arg("-resize")
                    .arg(&geometry)
                    .path(artifact)
                    .done(),
            )
        };

        match class {
            ContentClass::Image(ImageKind::Svg) => vec![
                Recipe::direct(
                    "rsvg-convert",
                    Argv::default()
                        .arg("--format=png")
                        .arg("--keep-aspect-ratio")
                        .arg("--width")
                        .arg(w.to_string())
                        .path(source)
                        .arg("-o")
                        .path(artifact)
                        .done(),
                ),
                magick("magick"),
                magick("convert"),
            ],
            ContentClass::Image(_) | ContentClass::Gif => vec![magick("magick"), magick("convert")],
            ContentClass::Audio => vec![Recipe::direct(
                "ffmpeg",
                Argv::default()
                    .arg("-v")
                    .arg("error")
                    .arg("-y")
                    .arg("-i")
                    .path(source)
                    .arg("-filter_complex")
                    .arg(format!("showwavespic=s={}x{}:split_channels=1", w, h))
                    .arg("-frames:v")
                    .arg("1")
                    .path(artifact)
                    .done(),
            )],
            ContentClass::Video => vec![
                Recipe::direct(
                    "ffmpegthumbnailer",
                    Argv::default()
                        .arg("-m")
                        .arg("-s")
                        .arg(w.to_string())
                        .arg("-i")
                        .path(source)
                        .arg("-o")
                        .path(artifact)
                        .done(),
                ),
                Recipe::direct(
                    "ffmpeg",
                    Argv::default()
                        .arg("-v")
                        .arg("error")
                        .arg("-y")
                        .arg("-i")
                        .path(source)
                        .arg("-vf")
                        .arg(format!("thumbnail,scale={}:-1", w))
                        .arg("-frames:v")
                        .arg("1")
                        .path(artifact)
                        .done(),
                ),
            ],
            ContentClass::Epub => vec![
                Recipe::direct(
                    "gnome-epub-thumbnailer",
                    Argv::default().arg("-s").arg(w.to_string()).path(source).path(artifact).done(),
                ),
                Recipe::direct(
                    "epub-thumbnailer",
                    Argv::default().path(source).path(artifact).arg(w.to_string()).done(),
                ),
            ],
            ContentClass::Font => vec![Recipe::direct(
                "fontpreview",
                Argv::default().arg("-i").path(source).arg("-o").path(artifact).done(),
            )],
            ContentClass::Pdf => {
                // pdftoppm appends the extension to the output root itself.
                let root = artifact.with_extension("");
                vec![Recipe::direct(
                    "pdftoppm",
                    Argv::default()
                        .arg("-jpeg")
                        .arg("-f")
                        .arg("1")
                        .arg("-singlefile")
                        .arg("-scale-to-x")
                        .arg(w.to_string())
                        .arg("-scale-to-y")
                        .arg("-1")
                        .path(source)
                        .path(&root)
                        .done(),
                )]
            }
            ContentClass::Djvu => vec![Recipe::direct(
                "ddjvu",
                Argv::default()
                    .arg("-format=ppm")
                    .arg("-page=1")
                    .arg(format!("-size={}x{}", w, h))
                    .path(source)
                    .path(artifact)
                    .done(),
            )],
            ContentClass::VectorImage => vec![Recipe::direct(
                "gs",
                Argv::default()
                    .arg("-q")
                    .arg("-dSAFER")
                    .arg("-dBATCH")
                    .arg("-dNOPAUSE")
                    .arg("-sDEVICE=jpeg")
                    .arg("-dFirstPage=1")
                    .arg("-dLastPage=1")
                    .arg("-dEPSCrop")
                    .arg({
                        let mut s = OsString::from("-sOutputFile=");
                        s.push(artifact.as_os_str());
                        s
                    })
                    .path(source)
                    .done(),
            )],
            ContentClass::Office => office_recipes(source, artifact),
            _ => Vec::new(),
        }
    }

    /// Run recipes in order until one produces a non-empty `artifact`.
    fn run_first(&self, recipes: &[Recipe], artifact: &Path) -> io::Result<()> {
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no producer installed");
        for recipe in recipes {
            let Some(mut cmd) = self.tools.command(recipe.program) else {
                continue;
            };
            match run(&mut cmd, recipe, artifact) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::info!("Producer {} failed: {}", recipe.program, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

fn office_recipes(source: &Path, artifact: &Path) -> Vec<Recipe> {
    let mut scratch = artifact.as_os_str().to_owned();
    scratch.push(".d");
    let dir = PathBuf::from(scratch);
    // The converter names its output after the source stem.
    let mut name = source.file_stem().unwrap_or(source.as_os_str()).to_owned();
    name.push(ArtifactFormat::Png.suffix());
    let file = dir.join(name);

    ["libreoffice", "soffice"]
        .into_iter()
        .map(|program| Recipe {
            program,
            args: Argv::default()
                .arg("--headless")
                .arg("--convert-to")
                .arg("png")
                .arg("--outdir")
                .path(&dir)
                .path(source)
                .done(),
            output: Output::Relocate {
                dir: dir.clone(),
                file: file.clone(),
            },
        })
        .collect()
}

fn run(cmd: &mut Command, recipe: &Recipe, artifact: &Path) -> io::Result<()> {
    if let Output::Relocate { dir, .. } = &recipe.output {
        std::fs::create_dir_all(dir)?;
    }
    let status = cmd
        .args(&recipe.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    let result = if !status.success() {
        Err(io::Error::new(io::ErrorKind::Other, format!("exited with {}", status)))
    } else if let Output::Relocate { file, .. } = &recipe.output {
        std::fs::rename(file, artifact)
    } else {
        Ok(())
    };

    if let Output::Relocate { dir, .. } = &recipe.output {
        let _ = std::fs::remove_dir_all(dir);
    }
    result?;

    if has_output(artifact) {
        Ok(())
    } else {
        if artifact.is_file() {
            let _ = std::fs::remove_file(artifact);
        }
        Err(io::Error::new(io::ErrorKind::Other, "producer left no output"))
    }
}

/// A non-empty file, or a directory with at least one entry.
fn has_output(path: &Path) -> bool {
    if path.is_dir() {
        return std::fs::read_dir(path).map(|mut d| d.next().is_some()).unwrap_or(false);
    }
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::install_script;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        bin: PathBuf,
        cache: PreviewCache,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let bin = dir.path().join("bin");
            fs::create_dir_all(&bin).unwrap();
            let cache = PreviewCache::new(dir.path().join("cache"));
            Self { dir, bin, cache }
        }

        fn source(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, b"content").unwrap();
            path
        }
    }

    #[test]
    fn test_artifact_formats() {
        assert_eq!(Generator::artifact_format(ContentClass::Pdf), Some(ArtifactFormat::Jpg));
        assert_eq!(Generator::artifact_format(ContentClass::Office), Some(ArtifactFormat::Png));
        assert_eq!(
            Generator::artifact_format(ContentClass::Image(ImageKind::Svg)),
            Some(ArtifactFormat::Png)
        );
        assert_eq!(Generator::artifact_format(ContentClass::Image(ImageKind::Jpeg)), None);
        assert_eq!(Generator::artifact_format(ContentClass::Markdown), None);
    }

    #[test]
    fn test_pdf_output_root_has_no_suffix() {
        let fx = Fixture::new();
        let counter = fx.dir.path().join("calls");
        install_script(
            &fx.bin,
            "pdftoppm",
            &format!(r#"echo x >> '{}'; for a; do last=$a; done; printf jpg > "$last.jpg""#, counter.display()),
        );
        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);
        let source = fx.source("report.pdf");

        let artifact = gen.generate(ContentClass::Pdf, &source).unwrap();
        assert_eq!(artifact, fx.cache.artifact_path(&source, ArtifactFormat::Jpg));
        assert_eq!(fs::read(&artifact).unwrap(), b"jpg");

        gen.generate(ContentClass::Pdf, &source).unwrap();
        assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_second_recipe_used_when_first_missing() {
        let fx = Fixture::new();
        install_script(&fx.bin, "ffmpeg", r#"for a; do last=$a; done; printf thumb > "$last""#);
        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);

        let artifact = gen.generate(ContentClass::Video, &fx.source("clip.mp4")).unwrap();
        assert_eq!(fs::read(artifact).unwrap(), b"thumb");
    }

    #[test]
    fn test_failing_producer_falls_through_and_leaves_nothing() {
        let fx = Fixture::new();
        install_script(&fx.bin, "magick", r#"for a; do last=$a; done; printf half > "$last"; exit 1"#);
        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);
        let source = fx.source("photo.png");

        assert!(gen.generate(ContentClass::Image(ImageKind::Generic), &source).is_none());
        assert!(!fx.cache.artifact_path(&source, ArtifactFormat::Jpg).exists());
    }

    #[test]
    fn test_office_output_is_relocated() {
        let fx = Fixture::new();
        // --headless --convert-to png --outdir DIR SRC
        install_script(
            &fx.bin,
            "libreoffice",
            r#"out=$5; src=$6; name=$(basename "$src"); printf png > "$out/${name%.*}.png""#,
        );
        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);
        let source = fx.source("big.office.docx");

        let artifact = gen.generate(ContentClass::Office, &source).unwrap();
        assert_eq!(artifact, fx.cache.artifact_path(&source, ArtifactFormat::Png));
        assert_eq!(fs::read(&artifact).unwrap(), b"png");
        let mut scratch = artifact.clone().into_os_string();
        scratch.push(".d");
        assert!(!PathBuf::from(scratch).exists());
    }

    #[test]
    fn test_frames_generated_once() {
        let fx = Fixture::new();
        let counter = fx.dir.path().join("calls");
        install_script(
            &fx.bin,
            "magick",
            &format!(
                r#"echo x >> '{}'; for a; do last=$a; done; dir=$(dirname "$last"); printf a > "$dir/frame-0000.jpg"; printf b > "$dir/frame-0001.jpg""#,
                counter.display()
            ),
        );
        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);
        let source = fx.source("cat.gif");

        let frames = gen.generate_frames(&source).unwrap();
        assert_eq!(fs::read_dir(&frames).unwrap().count(), 2);
        assert_eq!(gen.generate_frames(&source), Some(frames));
        assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_frames_without_producer() {
        let fx = Fixture::new();
        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);
        let source = fx.source("cat.gif");

        assert!(gen.generate_frames(&source).is_none());
        assert!(!fx.cache.frames_dir(&source).exists());
        assert!(!fx.cache.frames_staging_dir(&source).exists());
    }

    #[test]
    fn test_producer_writes_beside_the_artifact() {
        let fx = Fixture::new();
        let seen = fx.dir.path().join("seen");
        install_script(
            &fx.bin,
            "ffmpegthumbnailer",
            &format!(
                r#"for a; do last=$a; done; echo "$last" > '{}'; printf thumb > "$last""#,
                seen.display()
            ),
        );
        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);
        let source = fx.source("clip.mp4");

        let artifact = gen.generate(ContentClass::Video, &source).unwrap();
        let written = PathBuf::from(fs::read_to_string(&seen).unwrap().trim_end());
        assert_ne!(written, artifact);
        assert_eq!(written.parent(), artifact.parent());
        assert!(!written.exists());
        assert_eq!(fs::read(&artifact).unwrap(), b"thumb");
    }

    #[test]
    fn test_interrupted_frame_split_is_not_reused() {
        let fx = Fixture::new();
        let source = fx.source("cat.gif");
        // What a decomposition killed halfway leaves behind.
        let staging = fx.cache.frames_staging_dir(&source);
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("frame-0000.jpg"), b"a").unwrap();

        let tools = Toolbox::new(fx.bin.as_os_str());
        let gen = Generator::new(&fx.cache, &tools, 800, 600);
        assert!(fx.cache.lookup_frames(&source).is_none());
        assert!(gen.generate_frames(&source).is_none());
        assert!(!staging.exists());
    }
}
