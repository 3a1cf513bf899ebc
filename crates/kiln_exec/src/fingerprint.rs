//! Target fingerprints.
//!
//! A fingerprint summarises everything that determines a target's value:
//! its command text, storage format, bound parameters, the fingerprints of
//! its upstream targets and the content of its declared input files. Two
//! runs that agree on all of these produce the same fingerprint, regardless
//! of the order in which the pieces were gathered.

use std::io;
use std::path::{Component, Path, PathBuf};

use kiln_common::{Fingerprint, FingerprintHasher, HashAlgorithm};
use kiln_plan::Target;

/// Computes file and target fingerprints relative to a project root.
#[derive(Debug, Clone)]
pub struct FingerprintEngine {
    algorithm: HashAlgorithm,
    root: PathBuf,
}

impl FingerprintEngine {
    /// Creates an engine hashing with `algorithm` and resolving files under
    /// `root`.
    pub fn new(algorithm: HashAlgorithm, root: impl Into<PathBuf>) -> Self {
        Self {
            algorithm,
            root: root.into(),
        }
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The project root files are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hashes the content of a file given relative to the root.
    pub fn file(&self, path: &Path) -> io::Result<Fingerprint> {
        let data = std::fs::read(self.root.join(path))?;
        Ok(Fingerprint::from_bytes(self.algorithm, &data))
    }

    /// Combines a target's own definition with its upstream fingerprints
    /// (`deps`, keyed by target name) and input file hashes (`files`, keyed
    /// by path). Neither slice needs to be sorted.
    pub fn target(
        &self,
        target: &Target,
        deps: &[(&str, Fingerprint)],
        files: &[(PathBuf, Fingerprint)],
    ) -> Fingerprint {
        let mut h = FingerprintHasher::new(self.algorithm);
        h.write_str("command");
        h.write_str(target.text());
        h.write_str("format");
        h.write_str(target.storage_format().name());

        let mut params: Vec<&(String, String)> = target.meta().params.iter().collect();
        params.sort();
        h.write_str("params");
        h.write_bytes(&(params.len() as u64).to_le_bytes());
        for (name, value) in params {
            h.write_str(name);
            h.write_str(value);
        }

        let mut deps: Vec<&(&str, Fingerprint)> = deps.iter().collect();
        deps.sort_by(|a, b| a.0.cmp(b.0));
        h.write_str("deps");
        h.write_bytes(&(deps.len() as u64).to_le_bytes());
        for (name, fp) in deps {
            h.write_str(name);
            h.write_fingerprint(fp);
        }

        let mut files: Vec<(String, &Fingerprint)> =
            files.iter().map(|(p, fp)| (portable(p), fp)).collect();
        files.sort();
        h.write_str("files");
        h.write_bytes(&(files.len() as u64).to_le_bytes());
        for (path, fp) in files {
            h.write_str(&path);
            h.write_fingerprint(fp);
        }

        let mut outputs: Vec<String> = target.file_outputs().iter().map(|p| portable(p)).collect();
        outputs.sort();
        h.write_str("outputs");
        h.write_bytes(&(outputs.len() as u64).to_le_bytes());
        for path in outputs {
            h.write_str(&path);
        }
        h.finish()
    }
}

/// `/`-joined path, so fingerprints agree across platforms.
fn portable(path: &Path) -> String {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Value;
    use kiln_plan::{Param, Plan, Transform};

    fn target(text: &str) -> Target {
        Target::new("t", text, |_| Ok(Value::text("")))
    }

    fn fp(data: &str) -> Fingerprint {
        Fingerprint::from_bytes(HashAlgorithm::Xxh3, data.as_bytes())
    }

    #[test]
    fn deterministic_and_order_independent() {
        let engine = FingerprintEngine::new(HashAlgorithm::Xxh3, ".");
        let t = target("fit ${a} ${b}");
        let one = engine.target(
            &t,
            &[("a", fp("1")), ("b", fp("2"))],
            &[(PathBuf::from("x.csv"), fp("x")), (PathBuf::from("y.csv"), fp("y"))],
        );
        let two = engine.target(
            &t,
            &[("b", fp("2")), ("a", fp("1"))],
            &[(PathBuf::from("./y.csv"), fp("y")), (PathBuf::from("x.csv"), fp("x"))],
        );
        assert_eq!(one, two);
    }

    #[test]
    fn every_component_matters() {
        let engine = FingerprintEngine::new(HashAlgorithm::Xxh3, ".");
        let base = engine.target(&target("fit"), &[("a", fp("1"))], &[]);

        assert_ne!(base, engine.target(&target("fit2"), &[("a", fp("1"))], &[]));
        assert_ne!(base, engine.target(&target("fit"), &[("a", fp("2"))], &[]));
        assert_ne!(base, engine.target(&target("fit"), &[], &[]));
        assert_ne!(
            base,
            engine.target(
                &target("fit"),
                &[("a", fp("1"))],
                &[(PathBuf::from("d.csv"), fp("d"))]
            )
        );
        assert_ne!(
            base,
            engine.target(
                &target("fit").format(kiln_common::Format::Json),
                &[("a", fp("1"))],
                &[]
            )
        );
        assert_ne!(
            base,
            engine.target(&target("fit").file_out("out.bin"), &[("a", fp("1"))], &[])
        );

        let sha = FingerprintEngine::new(HashAlgorithm::Sha256, ".");
        assert_ne!(base, sha.target(&target("fit"), &[("a", fp("1"))], &[]));
    }

    #[test]
    fn parameters_are_mixed_in() {
        let plan = Plan::new().with(
            Target::new("model", "fit", |_| Ok(Value::text(""))).transform(Transform::Map(vec![
                Param::values("units", ["16", "32"]),
            ])),
        );
        let expanded = plan.expand().unwrap();
        let engine = FingerprintEngine::new(HashAlgorithm::Xxh3, ".");
        let a = engine.target(&expanded.targets()[0], &[], &[]);
        let b = engine.target(&expanded.targets()[1], &[], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn hashes_file_content_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.csv"), "1,2,3\n").unwrap();
        let engine = FingerprintEngine::new(HashAlgorithm::Xxh3, dir.path());
        let first = engine.file(Path::new("data.csv")).unwrap();
        assert_eq!(first, Fingerprint::from_bytes(HashAlgorithm::Xxh3, b"1,2,3\n"));

        std::fs::write(dir.path().join("data.csv"), "1,2,4\n").unwrap();
        assert_ne!(engine.file(Path::new("data.csv")).unwrap(), first);
        assert!(engine.file(Path::new("missing.csv")).is_err());
    }
}
