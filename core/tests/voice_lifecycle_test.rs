use async_trait::async_trait;
use audria_core::voice::{
    GenerateRequest, SpeechSynthesizer, SynthEngines, SynthesisRequest, UploadRequest,
    VoiceService, VoiceStore,
};
use audria_core::{AudriaError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

struct MockCloner;

#[async_trait]
impl SpeechSynthesizer for MockCloner {
    fn name(&self) -> &str {
        "mock-cloner"
    }

    fn clones_voice(&self) -> bool {
        true
    }

    async fn synthesize(&self, req: &SynthesisRequest) -> Result<()> {
        assert!(req.speaker_wav.as_ref().is_some_and(|p| p.is_file()));
        tokio::fs::write(&req.out_path, format!("RIFF:{}", req.text)).await?;
        Ok(())
    }
}

fn service(root: &Path) -> VoiceService {
    let exts = ["wav", "mp3", "m4a", "ogg", "flac", "aac"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let store = VoiceStore::new(root, 16 * 1024 * 1024, exts).unwrap();
    VoiceService::new(store, SynthEngines::new(Some(Arc::new(MockCloner)), None))
}

fn upload(user: &str, name: &str, filename: &str) -> UploadRequest {
    UploadRequest {
        user_id: user.into(),
        voice_name: name.into(),
        voice_type: "custom".into(),
        filename: filename.into(),
        bytes: b"sample-bytes".to_vec(),
        test_text: Some(format!("This is {name}")),
    }
}

#[tokio::test]
async fn upload_list_delete_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = service(tmp.path());

    let rec = svc.upload(upload("user-a", "Grandma", "clip.m4a")).await.unwrap();
    assert!(rec.reference_path.ends_with("reference.m4a"));
    let test_path = rec.test_path.clone().unwrap();
    assert_eq!(
        std::fs::read_to_string(&test_path).unwrap(),
        "RIFF:This is Grandma"
    );

    let listed = svc.list("user-a").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].voice_id, rec.voice_id);
    assert_eq!(listed[0].voice_name, "Grandma");
    assert!(listed[0].created_at.is_some());

    svc.delete("user-a", &rec.voice_id).await.unwrap();
    assert!(!Path::new(&rec.voice_dir).exists());
    assert!(svc.list("user-a").await.unwrap().is_empty());
}

#[tokio::test]
async fn users_never_see_each_others_voices() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = service(tmp.path());

    let a = svc.upload(upload("user-a", "Mom", "a.wav")).await.unwrap();
    // "user-a" is a prefix of "user-ab"; ownership must still be exact
    let ab = svc.upload(upload("user-ab", "Dad", "b.wav")).await.unwrap();

    let for_a: Vec<String> = svc
        .list("user-a")
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.voice_id)
        .collect();
    assert_eq!(for_a, vec![a.voice_id.clone()]);

    assert!(matches!(
        svc.delete("user-a", &ab.voice_id).await,
        Err(AudriaError::Forbidden(_))
    ));
    assert!(matches!(
        svc.info("user-ab", &a.voice_id).await,
        Err(AudriaError::Forbidden(_))
    ));
    assert!(matches!(
        svc.generate(
            "user-ab",
            GenerateRequest {
                text: "hi".into(),
                voice_id: a.voice_id.clone(),
                language: "en".into(),
            }
        )
        .await,
        Err(AudriaError::Forbidden(_))
    ));
    assert!(Path::new(&a.voice_dir).is_dir());
}

#[tokio::test]
async fn listing_is_newest_first() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = service(tmp.path());
    let store = svc.store();

    for (name, ts) in [("Old", 1_600_000_000), ("New", 1_700_000_000)] {
        let id = audria_core::VoiceId::generate("user-a", name, ts);
        store.create_voice(&id, "wav", b"x").await.unwrap();
    }
    let names: Vec<String> = svc
        .list("user-a")
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.voice_name)
        .collect();
    assert_eq!(names, vec!["New", "Old"]);
}

#[tokio::test]
async fn generated_audio_lands_in_temp_and_is_pruned() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = service(tmp.path());
    let rec = svc.upload(upload("user-a", "Grandma", "a.wav")).await.unwrap();

    let out = svc
        .generate(
            "user-a",
            GenerateRequest {
                text: "Time for lunch".into(),
                voice_id: rec.voice_id.clone(),
                language: "en".into(),
            },
        )
        .await
        .unwrap();
    assert!(out.file_path.starts_with(svc.store().temp_dir()));
    assert_eq!(out.tts_type, "mock-cloner");

    // temp output never shows up as a voice
    assert_eq!(svc.list("user-a").await.unwrap().len(), 1);

    let removed = svc.store().prune_temp(Duration::ZERO).await.unwrap();
    assert_eq!(removed, 1);
    assert!(!out.file_path.exists());
    assert!(Path::new(&rec.voice_dir).is_dir());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_name_uploads_stay_separate() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = Arc::new(service(tmp.path()));

    for round in 0..20 {
        let name = format!("Dad{round}");
        let mut first = upload("user-a", &name, "a.wav");
        first.bytes = b"first".to_vec();
        let mut second = upload("user-a", &name, "b.wav");
        second.bytes = b"second".to_vec();

        let (a, b) = tokio::join!(
            tokio::spawn({
                let svc = svc.clone();
                async move { svc.upload(first).await }
            }),
            tokio::spawn({
                let svc = svc.clone();
                async move { svc.upload(second).await }
            }),
        );
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();

        assert_ne!(a.voice_id, b.voice_id);
        assert_eq!(std::fs::read(&a.reference_path).unwrap(), b"first");
        assert_eq!(std::fs::read(&b.reference_path).unwrap(), b"second");
    }
    assert_eq!(svc.list("user-a").await.unwrap().len(), 40);
}
