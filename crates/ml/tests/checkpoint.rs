use ml::{checkpoint, MlError, Tensor};
use std::path::PathBuf;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ml-ckpt-{}-{name}.ckpt", std::process::id()))
}

#[test]
fn save_then_restore_by_name() {
    let path = scratch("restore");
    let a = Tensor::from_vec(vec![2, 2], vec![1.0, -2.0, 3.5, 0.25]);
    let b = Tensor::from_vec(vec![3], vec![7.0, 8.0, 9.0]);
    checkpoint::save(&path, &[("layer.w".into(), &a), ("layer.b".into(), &b)]).unwrap();

    let mut a2 = Tensor::zeros(vec![2, 2]);
    let mut b2 = Tensor::zeros(vec![3]);
    let id = a2.id;
    checkpoint::restore(
        &path,
        vec![("layer.w".into(), &mut a2), ("layer.b".into(), &mut b2)],
    )
    .unwrap();
    assert_eq!(a2.data, a.data);
    assert_eq!(b2.data, b.data);
    assert_eq!(a2.id, id);
    let _ = std::fs::remove_file(path);
}

#[test]
fn restore_rejects_shape_changes() {
    let path = scratch("shape");
    let a = Tensor::from_vec(vec![2], vec![1.0, 2.0]);
    checkpoint::save(&path, &[("w".into(), &a)]).unwrap();
    let mut wrong = Tensor::zeros(vec![1, 2]);
    let err = checkpoint::restore(&path, vec![("w".into(), &mut wrong)]).unwrap_err();
    assert!(matches!(err, MlError::ShapeMismatch { .. }));
    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_file_is_io_error() {
    let err = checkpoint::load(&scratch("does-not-exist")).unwrap_err();
    assert!(matches!(err, MlError::Io(_)));
}

fn write_raw(path: &PathBuf, manifest: &str, payload: &[u8]) {
    let mut bytes = b"ASKC".to_vec();
    bytes.extend_from_slice(&(manifest.len() as u32).to_le_bytes());
    bytes.extend_from_slice(manifest.as_bytes());
    bytes.extend_from_slice(payload);
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn corrupt_extents_are_format_errors() {
    let huge = usize::MAX;
    for (tag, manifest) in [
        ("len", format!(r#"[{{"name":"w","shape":[2],"offset":0,"len":{huge}}}]"#)),
        ("offset", format!(r#"[{{"name":"w","shape":[1],"offset":{huge},"len":1}}]"#)),
        ("shape", format!(r#"[{{"name":"w","shape":[{huge},{huge}],"offset":0,"len":1}}]"#)),
    ] {
        let path = scratch(&format!("corrupt-{tag}"));
        write_raw(&path, &manifest, &[0u8; 8]);
        let err = checkpoint::load(&path).unwrap_err();
        assert!(matches!(err, MlError::Format(_)), "{tag}: {err}");
        let _ = std::fs::remove_file(path);
    }
}
