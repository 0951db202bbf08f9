//! Speech engine backed by a local synthesizer binary.
//!
//! Supports `espeak-ng` / `espeak` and macOS `say`. Each utterance is one
//! child process fed through stdin; pause and resume stop and continue the
//! child with signals on Unix.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;

use cinechat_core::config::SpeechBackendKind;
use cinechat_core::types::UtteranceId;

use crate::engine::{EngineNotifier, SpeechEngine};
use crate::error::SpeechError;
use crate::voice::{Utterance, Voice};

/// espeak's default speed in words per minute.
const ESPEAK_BASE_WPM: f32 = 175.0;
/// espeak's default pitch on its 0-99 scale.
const ESPEAK_BASE_PITCH: f32 = 50.0;
/// espeak's default amplitude on its 0-200 scale.
const ESPEAK_BASE_AMPLITUDE: f32 = 100.0;
/// `say`'s default speaking rate in words per minute.
const SAY_BASE_WPM: f32 = 175.0;
/// Locale assumed when the environment names none; espeak's own default.
const FALLBACK_LOCALE: &str = "en";

/// A located synthesizer binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthProgram {
    Espeak(PathBuf),
    Say(PathBuf),
}

impl SynthProgram {
    /// Find the binary for `kind` on `PATH`.
    pub fn locate(kind: SpeechBackendKind) -> Result<Self, SpeechError> {
        match kind {
            SpeechBackendKind::Espeak => which::which("espeak-ng")
                .or_else(|_| which::which("espeak"))
                .map(SynthProgram::Espeak)
                .map_err(|_| SpeechError::Unavailable("espeak-ng or espeak".to_string())),
            SpeechBackendKind::Say => which::which("say")
                .map(SynthProgram::Say)
                .map_err(|_| SpeechError::Unavailable("say".to_string())),
            SpeechBackendKind::None => Err(SpeechError::Unavailable(
                "speech backend is set to none".to_string(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SynthProgram::Espeak(p) | SynthProgram::Say(p) => p,
        }
    }

    /// Arguments that print the voice catalog.
    pub fn voice_list_args(&self) -> Vec<String> {
        match self {
            SynthProgram::Espeak(_) => vec!["--voices".to_string()],
            SynthProgram::Say(_) => vec!["-v".to_string(), "?".to_string()],
        }
    }

    /// Parse the output of the voice-list command.
    pub fn parse_voice_list(&self, output: &str) -> Vec<Voice> {
        match self {
            SynthProgram::Espeak(_) => parse_espeak_voices(output),
            SynthProgram::Say(_) => parse_say_voices(output),
        }
    }

    /// Arguments that speak an utterance whose text is written to stdin.
    pub fn speak_args(&self, utterance: &Utterance) -> Vec<String> {
        match self {
            SynthProgram::Espeak(_) => {
                let wpm = (ESPEAK_BASE_WPM * utterance.rate).round() as u32;
                let pitch = (ESPEAK_BASE_PITCH * utterance.pitch).round().clamp(0.0, 99.0) as u32;
                let amplitude =
                    (ESPEAK_BASE_AMPLITUDE * utterance.volume).round().clamp(0.0, 200.0) as u32;
                vec![
                    "-v".to_string(),
                    utterance.voice.id.clone(),
                    "-s".to_string(),
                    wpm.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "-a".to_string(),
                    amplitude.to_string(),
                    "--stdin".to_string(),
                ]
            }
            // `say` has no pitch or volume flag.
            SynthProgram::Say(_) => {
                let wpm = (SAY_BASE_WPM * utterance.rate).round() as u32;
                vec![
                    "-v".to_string(),
                    utterance.voice.id.clone(),
                    "-r".to_string(),
                    wpm.to_string(),
                ]
            }
        }
    }
}

/// Parse `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-gb           --/M      English_(Great_Britain) gmw/en         (en 2)
/// ```
fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let age_gender = cols.next()?;
            let name = cols.next()?.replace('_', " ");
            let name = match age_gender.rsplit('/').next() {
                Some("M") => format!("{} (male)", name),
                Some("F") => format!("{} (female)", name),
                _ => name,
            };
            Some(Voice::new(language, name, language))
        })
        .collect()
}

/// Locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, as a lowercase tag like
/// `en-us`. Falls back to `en`.
pub fn system_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|value| normalize_locale(&value))
        .find(|tag| !tag.is_empty() && tag != "c" && tag != "posix")
        .unwrap_or_else(|| FALLBACK_LOCALE.to_string())
}

/// `en_US.UTF-8@euro` -> `en-us`.
fn normalize_locale(value: &str) -> String {
    value
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim()
        .replace('_', "-")
        .to_ascii_lowercase()
}

/// 0 for male-tagged names, 2 for female-tagged, 1 otherwise.
fn gender_tag_rank(name: &str) -> u8 {
    if name.ends_with("(female)") {
        2
    } else if name.ends_with("(male)") {
        0
    } else {
        1
    }
}

/// 0 for an exact locale match, 1 for the same language, 2 otherwise.
fn locale_rank(language: &str, locale: &str) -> u8 {
    let language = normalize_locale(language);
    let primary = |tag: &str| tag.split('-').next().unwrap_or_default().to_string();
    if language == locale {
        0
    } else if primary(&language) == primary(locale) {
        1
    } else {
        2
    }
}

/// Reorder a catalog so voices for `locale` come first.
///
/// Male-tagged voices precede untagged and female-tagged ones, since
/// "female" also contains the male token "male". Within each group the
/// locale's own voices lead and engine order is otherwise kept.
pub fn order_for_locale(voices: &mut [Voice], locale: &str) {
    let locale = normalize_locale(locale);
    voices.sort_by_key(|v| (gender_tag_rank(&v.name), locale_rank(&v.language, &locale)));
}

/// Parse `say -v ?`:
///
/// ```text
/// Alex                en_US    # Most people recognize me by my voice.
/// Bad News            en_US    # The light you see at the end of the tunnel...
/// ```
fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, locale) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Voice::new(name, name, locale))
        })
        .collect()
}

struct RunningUtterance {
    id: UtteranceId,
    pid: Option<u32>,
    finished: Arc<AtomicBool>,
    cancel: oneshot::Sender<()>,
}

/// [`SpeechEngine`] that runs a synthesizer process per utterance.
pub struct ProcessEngine {
    program: SynthProgram,
    notifier: EngineNotifier,
    locale: String,
    running: Option<RunningUtterance>,
}

impl ProcessEngine {
    pub fn new(program: SynthProgram, notifier: EngineNotifier) -> Self {
        Self {
            program,
            notifier,
            locale: system_locale(),
            running: None,
        }
    }


    /// Locate the binary for `kind` and build an engine around it.
    pub fn locate(kind: SpeechBackendKind, notifier: EngineNotifier) -> Result<Self, SpeechError> {
        let program = SynthProgram::locate(kind)?;
        tracing::info!(path = %program.path().display(), "Speech synthesizer found");
        Ok(Self::new(program, notifier))
    }

    /// Pid of the live utterance, if one is still running.
    fn live_pid(&self) -> Option<u32> {
        self.running
            .as_ref()
            .filter(|r| !r.finished.load(Ordering::Acquire))
            .and_then(|r| r.pid)
    }
}

impl SpeechEngine for ProcessEngine {
    fn request_voices(&mut self) {
        let program = self.program.clone();
        let notifier = self.notifier.clone();
        let locale = self.locale.clone();
        tokio::spawn(async move {
            let output = Command::new(program.path())
                .args(program.voice_list_args())
                .stdin(Stdio::null())
                .output()
                .await;
            match output {
                Ok(out) if out.status.success() => {
                    let mut voices =
                        program.parse_voice_list(&String::from_utf8_lossy(&out.stdout));
                    order_for_locale(&mut voices, &locale);
                    tracing::debug!(count = voices.len(), %locale, "Synthesizer voices listed");
                    notifier.voices_changed(voices);
                }
                Ok(out) => {
                    tracing::warn!(status = %out.status, "Listing synthesizer voices failed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not run synthesizer to list voices");
                }
            }
        });
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError> {
        self.cancel();

        let mut child = Command::new(self.program.path())
            .args(self.program.speak_args(utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Engine(format!("failed to start synthesizer: {}", e)))?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let finished = Arc::new(AtomicBool::new(false));
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let id = utterance.id;
        let text = utterance.text.clone();
        let notifier = self.notifier.clone();
        let done = Arc::clone(&finished);

        tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    tracing::debug!(error = %e, "Synthesizer closed stdin early");
                }
            }

            tokio::select! {
                status = child.wait() => {
                    done.store(true, Ordering::Release);
                    match status {
                        Ok(s) if s.success() => notifier.utterance_ended(id),
                        Ok(s) => notifier.utterance_failed(id, format!("synthesizer exited with {}", s)),
                        Err(e) => notifier.utterance_failed(id, e.to_string()),
                    }
                }
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "Synthesizer already gone on cancel");
                    }
                    done.store(true, Ordering::Release);
                }
            }
        });

        self.running = Some(RunningUtterance {
            id: utterance.id,
            pid,
            finished,
            cancel: cancel_tx,
        });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(running) = self.running.take() {
            if running.cancel.send(()).is_ok() {
                tracing::debug!(utterance_id = %running.id, "Synthesizer cancelled");
            }
        }
    }

    fn pause(&mut self) -> Result<(), SpeechError> {
        match self.live_pid() {
            Some(pid) => signal(pid, Signal::Stop),
            None => Err(SpeechError::Engine("nothing playing".to_string())),
        }
    }

    fn resume(&mut self) -> Result<(), SpeechError> {
        match self.live_pid() {
            Some(pid) => signal(pid, Signal::Continue),
            None => Err(SpeechError::Engine("nothing playing".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Stop,
    Continue,
}

#[cfg(unix)]
fn signal(pid: u32, sig: Signal) -> Result<(), SpeechError> {
    let signum = match sig {
        Signal::Stop => libc::SIGSTOP,
        Signal::Continue => libc::SIGCONT,
    };
    // SAFETY: kill(2) has no memory-safety preconditions; `pid` is a child
    // this engine spawned and has not seen exit.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signum) };
    if rc == 0 {
        Ok(())
    } else {
        Err(SpeechError::Engine(
            std::io::Error::last_os_error().to_string(),
        ))
    }
}

#[cfg(not(unix))]
fn signal(_pid: u32, sig: Signal) -> Result<(), SpeechError> {
    Err(SpeechError::Unsupported(match sig {
        Signal::Stop => "pause",
        Signal::Continue => "resume",
    }))
}

#[cfg(test)]
mod tests {
    use cinechat_core::types::VoiceGender;

    use super::*;
    use crate::voice::select_voice;

    const ESPEAK_OUTPUT: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  am              --/-      Amharic            sem/am
 2  en-gb           --/M      English_(Great_Britain) gmw/en               (en 2)
 5  en-us           --/F      English_(America)  gmw/en-US            (en 3)
";

    const SAY_OUTPUT: &str = "\
Alex                en_US    # Most people recognize me by my voice.
Bad News            en_US    # The light you see at the end of the tunnel is the headlamp of a fast approaching train.
Samantha            en_US    # Hello, my name is Samantha. I am an American-English voice.
";

    fn espeak() -> SynthProgram {
        SynthProgram::Espeak(PathBuf::from("/usr/bin/espeak-ng"))
    }

    fn say() -> SynthProgram {
        SynthProgram::Say(PathBuf::from("/usr/bin/say"))
    }

    #[test]
    fn test_parse_espeak_voices() {
        let voices = espeak().parse_voice_list(ESPEAK_OUTPUT);
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[0], Voice::new("af", "Afrikaans (male)", "af"));
        assert_eq!(voices[1].name, "Amharic");
        assert_eq!(voices[2].id, "en-gb");
        assert_eq!(voices[2].name, "English (Great Britain) (male)");
        assert_eq!(voices[3].name, "English (America) (female)");
        assert_eq!(voices[3].language, "en-us");
    }

    #[test]
    fn test_espeak_catalog_picks_local_voices() {
        let mut voices = espeak().parse_voice_list(ESPEAK_OUTPUT);
        order_for_locale(&mut voices, "en_US.UTF-8");

        let male = select_voice(&voices, VoiceGender::Male).unwrap();
        assert_ne!(male.id, "af");
        assert_eq!(male.id, "en-gb");
        let female = select_voice(&voices, VoiceGender::Female).unwrap();
        assert_eq!(female.id, "en-us");
    }

    #[test]
    fn test_order_prefers_exact_locale_then_language() {
        let mut voices = vec![
            Voice::new("af", "Afrikaans (male)", "af"),
            Voice::new("en-gb", "English (Great Britain) (male)", "en-gb"),
            Voice::new("en-us", "English (America) (male)", "en-us"),
        ];
        order_for_locale(&mut voices, "en_US");
        let ids: Vec<&str> = voices.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["en-us", "en-gb", "af"]);
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en_US.UTF-8"), "en-us");
        assert_eq!(normalize_locale("de_DE@euro"), "de-de");
        assert_eq!(normalize_locale("fr"), "fr");
    }

    #[test]
    fn test_parse_espeak_ignores_noise() {
        assert!(espeak().parse_voice_list("").is_empty());
        assert!(espeak().parse_voice_list("espeak-ng: not found\n").is_empty());
    }

    #[test]
    fn test_parse_say_voices() {
        let voices = say().parse_voice_list(SAY_OUTPUT);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0], Voice::new("Alex", "Alex", "en_US"));
        assert_eq!(voices[1].name, "Bad News");
        assert_eq!(voices[2].language, "en_US");
    }

    #[test]
    fn test_parse_say_skips_blank_lines() {
        assert!(say().parse_voice_list("\n   \n").is_empty());
    }

    #[test]
    fn test_espeak_speak_args_follow_gender_pitch() {
        let voice = Voice::new("en-gb", "English (Great Britain)", "en-gb");
        let female = Utterance::new("Hello", voice.clone(), VoiceGender::Female);
        assert_eq!(
            espeak().speak_args(&female),
            vec!["-v", "en-gb", "-s", "175", "-p", "60", "-a", "100", "--stdin"]
        );

        let male = Utterance::new("Hello", voice, VoiceGender::Male);
        let args = espeak().speak_args(&male);
        assert_eq!(args[5], "45");
    }

    #[test]
    fn test_say_speak_args() {
        let voice = Voice::new("Samantha", "Samantha", "en_US");
        let u = Utterance::new("Hello", voice, VoiceGender::Female);
        assert_eq!(say().speak_args(&u), vec!["-v", "Samantha", "-r", "175"]);
    }

    #[test]
    fn test_voice_list_args() {
        assert_eq!(espeak().voice_list_args(), vec!["--voices"]);
        assert_eq!(say().voice_list_args(), vec!["-v", "?"]);
    }

    #[test]
    fn test_pause_and_resume_without_utterance_fail() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut engine = ProcessEngine::new(espeak(), EngineNotifier::new(tx));
        assert!(matches!(engine.pause(), Err(SpeechError::Engine(_))));
        assert!(matches!(engine.resume(), Err(SpeechError::Engine(_))));
    }

    #[test]
    fn test_locate_none_backend_is_unavailable() {
        assert!(matches!(
            SynthProgram::locate(SpeechBackendKind::None),
            Err(SpeechError::Unavailable(_))
        ));
    }

    #[cfg(unix)]
    mod lifecycle {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        use tokio::sync::mpsc;

        use super::*;
        use crate::adapter::SpeechEvent;

        /// Engine whose "synthesizer" is a shell script in a temp dir.
        fn scripted_engine(
            dir: &tempfile::TempDir,
            body: &str,
        ) -> (ProcessEngine, mpsc::UnboundedReceiver<SpeechEvent>) {
            let path = dir.path().join("fake-espeak");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

            let (tx, rx) = mpsc::unbounded_channel();
            let engine = ProcessEngine::new(SynthProgram::Espeak(path), EngineNotifier::new(tx));
            (engine, rx)
        }

        fn utterance() -> Utterance {
            Utterance::new(
                "Hello there",
                Voice::new("en-gb", "English (Great Britain) (male)", "en-gb"),
                VoiceGender::Male,
            )
        }

        async fn next_event(rx: &mut mpsc::UnboundedReceiver<SpeechEvent>) -> SpeechEvent {
            tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for engine notification")
                .expect("notifier dropped")
        }

        fn process_alive(pid: u32) -> bool {
            unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
        }

        #[cfg(target_os = "linux")]
        fn process_state(pid: u32) -> Option<char> {
            let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
            let after_name = stat.rsplit_once(')')?.1;
            after_name.trim_start().chars().next()
        }

        async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
            for _ in 0..100 {
                if check() {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            false
        }

        #[tokio::test]
        async fn test_clean_exit_reports_ended() {
            let dir = tempfile::tempdir().unwrap();
            let (mut engine, mut rx) = scripted_engine(&dir, "cat > /dev/null\nexit 0");
            let u = utterance();

            engine.speak(&u).unwrap();
            assert_eq!(next_event(&mut rx).await, SpeechEvent::UtteranceEnded(u.id));
            assert_eq!(engine.live_pid(), None);
            assert!(matches!(engine.pause(), Err(SpeechError::Engine(_))));
        }

        #[tokio::test]
        async fn test_nonzero_exit_reports_failure() {
            let dir = tempfile::tempdir().unwrap();
            let (mut engine, mut rx) = scripted_engine(&dir, "cat > /dev/null\nexit 1");
            let u = utterance();

            engine.speak(&u).unwrap();
            match next_event(&mut rx).await {
                SpeechEvent::UtteranceFailed(id, reason) => {
                    assert_eq!(id, u.id);
                    assert!(reason.contains("exited"));
                }
                other => panic!("unexpected event: {:?}", other),
            }
            assert_eq!(engine.live_pid(), None);
        }

        #[tokio::test]
        async fn test_cancel_kills_child_silently() {
            let dir = tempfile::tempdir().unwrap();
            let (mut engine, mut rx) = scripted_engine(&dir, "exec sleep 30");

            engine.speak(&utterance()).unwrap();
            let pid = engine.live_pid().unwrap();
            assert!(process_alive(pid));

            engine.cancel();
            assert!(wait_until(|| !process_alive(pid)).await);
            assert_eq!(engine.live_pid(), None);

            let quiet = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
            assert!(quiet.is_err(), "cancel must not notify: {:?}", quiet);
        }

        #[tokio::test]
        async fn test_pause_and_resume_signal_live_child() {
            let dir = tempfile::tempdir().unwrap();
            let (mut engine, _rx) = scripted_engine(&dir, "exec sleep 30");

            engine.speak(&utterance()).unwrap();
            let pid = engine.live_pid().unwrap();

            engine.pause().unwrap();
            #[cfg(target_os = "linux")]
            assert!(wait_until(|| process_state(pid) == Some('T')).await);

            engine.resume().unwrap();
            #[cfg(target_os = "linux")]
            assert!(wait_until(|| process_state(pid) == Some('S')).await);

            engine.cancel();
            assert!(wait_until(|| !process_alive(pid)).await);
        }

        #[tokio::test]
        async fn test_new_utterance_replaces_running_one() {
            let dir = tempfile::tempdir().unwrap();
            let (mut engine, _rx) = scripted_engine(&dir, "exec sleep 30");

            engine.speak(&utterance()).unwrap();
            let first = engine.live_pid().unwrap();
            engine.speak(&utterance()).unwrap();
            let second = engine.live_pid().unwrap();

            assert_ne!(first, second);
            assert!(wait_until(|| !process_alive(first)).await);
            engine.cancel();
        }
    }
}
