//! TTS narration of debate scripts using kokoro-tiny.

use hound::{SampleFormat, WavSpec, WavWriter};
use kokoro_tiny::TtsEngine;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::VoicesConfig;
use crate::error::PolidebateError;
use crate::persona::Persona;
use crate::script::ScriptLine;

/// Output sample rate of the kokoro model.
pub const SAMPLE_RATE: u32 = 24_000;

const CHUNK_CHARS: usize = 200;
const CHUNK_PAUSE_SECS: f32 = 0.3;
const TRAILING_PAD_SECS: f32 = 0.5;
const LINE_GAP_SECS: f32 = 0.5;
const FILE_TEXT_CHARS: usize = 30;

/// Something that can turn short text into mono samples at [`SAMPLE_RATE`].
pub trait SpeechSynthesizer {
    fn voices(&self) -> Vec<String>;

    fn synthesize(&mut self, text: &str, voice_id: &str) -> Result<Vec<f32>, PolidebateError>;
}

/// [`SpeechSynthesizer`] backed by the kokoro-tiny engine.
pub struct KokoroSynthesizer {
    engine: TtsEngine,
}

impl KokoroSynthesizer {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new() -> Result<Self, PolidebateError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| PolidebateError::Tts(format!("Failed to initialize TTS: {}", e)))?;
        Ok(Self { engine })
    }
}

impl SpeechSynthesizer for KokoroSynthesizer {
    fn voices(&self) -> Vec<String> {
        self.engine.voices()
    }

    fn synthesize(&mut self, text: &str, voice_id: &str) -> Result<Vec<f32>, PolidebateError> {
        self.engine
            .synthesize(text, Some(voice_id))
            .map_err(|e| PolidebateError::Tts(format!("Synthesis failed: {}", e)))
    }
}

/// Files written by a narration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Narration {
    pub files: Vec<PathBuf>,
    pub combined: Option<PathBuf>,
}

/// Speaks script lines with each persona's voice.
pub struct Narrator<S: SpeechSynthesizer> {
    synth: S,
    voices: VoicesConfig,
    available_voices: Vec<String>,
}

impl<S: SpeechSynthesizer> Narrator<S> {
    pub fn new(synth: S, voices: VoicesConfig) -> Self {
        let available_voices = synth.voices();
        Self {
            synth,
            voices,
            available_voices,
        }
    }

    /// Get list of available voice IDs.
    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), PolidebateError> {
        if voice_id.is_empty() {
            return Err(PolidebateError::Tts(format!(
                "Voice ID cannot be empty. Available voices:\n{}",
                self.format_available_voices()
            )));
        }

        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(PolidebateError::Tts(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                self.format_available_voices()
            )));
        }

        Ok(())
    }

    /// English voices, one per line.
    pub fn format_available_voices(&self) -> String {
        let mut english_voices: Vec<&String> = self
            .available_voices
            .iter()
            .filter(|v| {
                v.starts_with("af_")
                    || v.starts_with("am_")
                    || v.starts_with("bf_")
                    || v.starts_with("bm_")
            })
            .collect();
        english_voices.sort();

        english_voices
            .iter()
            .map(|v| format!("  - {}", v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Validate both persona voices.
    pub fn validate_all_voices(&self) -> Result<(), PolidebateError> {
        for persona in Persona::ALL {
            self.validate_voice(persona.voice(&self.voices))?;
        }
        Ok(())
    }

    /// Synthesize text in chunks; the engine only handles short inputs.
    pub fn synthesize(&mut self, text: &str, voice_id: &str) -> Result<Vec<f32>, PolidebateError> {
        self.validate_voice(voice_id)?;

        let mut all_samples = Vec::new();
        for chunk in split_into_chunks(text, CHUNK_CHARS) {
            if chunk.trim().is_empty() {
                continue;
            }
            all_samples.extend(self.synth.synthesize(&chunk, voice_id)?);
            all_samples.extend(silence(CHUNK_PAUSE_SECS));
        }
        all_samples.extend(silence(TRAILING_PAD_SECS));

        Ok(adjust_audio_speed(all_samples, self.voices.speed))
    }

    /// Synthesize a script line with its speaker's voice.
    pub fn synthesize_line(&mut self, line: &ScriptLine) -> Result<Vec<f32>, PolidebateError> {
        let voice = line.speaker.voice(&self.voices).to_string();
        self.synthesize(&line.text, &voice)
    }

    /// Write one WAV per line into `out_dir`, plus `debate.wav` when `combine` is set.
    pub fn narrate(
        &mut self,
        lines: &[ScriptLine],
        out_dir: &Path,
        combine: bool,
    ) -> Result<Narration, PolidebateError> {
        self.validate_all_voices()?;
        fs::create_dir_all(out_dir)?;

        let mut narration = Narration::default();
        let mut segments = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            debug!(line = i + 1, speaker = line.speaker.tag(), "synthesizing line");
            let samples = self.synthesize_line(line)?;

            let path = out_dir.join(audio_filename(i, line));
            write_wav(&path, &samples)?;
            narration.files.push(path);

            if combine {
                segments.push(samples);
            }
        }

        if combine && !segments.is_empty() {
            let path = out_dir.join("debate.wav");
            write_wav(&path, &combine_audio_segments(segments, LINE_GAP_SECS, SAMPLE_RATE))?;
            narration.combined = Some(path);
        }

        info!(files = narration.files.len(), dir = %out_dir.display(), "narration complete");
        Ok(narration)
    }
}

/// `NN_SPEAKER_<first 30 chars>.wav`, spaces and path separators replaced by `_`.
pub fn audio_filename(index: usize, line: &ScriptLine) -> String {
    let snippet: String = line
        .text
        .chars()
        .take(FILE_TEXT_CHARS)
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{:02}_{}_{}.wav", index + 1, line.speaker.tag(), snippet)
}

/// Write mono 16-bit PCM at [`SAMPLE_RATE`].
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<(), PolidebateError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| PolidebateError::Tts(format!("Failed to save WAV: {}", e));

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}

fn silence(seconds: f32) -> Vec<f32> {
    vec![0.0; (seconds * SAMPLE_RATE as f32) as usize]
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // Overlong sentences fall back to comma boundaries
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part);
                    current_chunk.push(' ');
                }
            } else {
                current_chunk.push_str(sentence);
                current_chunk.push(' ');
            }
        } else {
            current_chunk.push_str(sentence);
            current_chunk.push(' ');
        }
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// Adjust audio playback speed using linear interpolation.
/// Rate < 1.0 = slower (e.g., 0.75 = 75% speed), Rate > 1.0 = faster.
pub fn adjust_audio_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if (rate - 1.0).abs() < 0.001 || rate <= 0.0 {
        return samples;
    }

    let new_len = (samples.len() as f32 / rate) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * rate;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            result.push(samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}

/// Combine multiple audio segments with silence gaps.
pub fn combine_audio_segments(
    segments: Vec<Vec<f32>>,
    gap_seconds: f32,
    sample_rate: u32,
) -> Vec<f32> {
    let gap_samples = (gap_seconds * sample_rate as f32) as usize;
    let silence: Vec<f32> = vec![0.0; gap_samples];

    let mut combined = Vec::new();

    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            combined.extend(&silence);
        }
        combined.extend(segment);
    }

    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits one sample per input character and records each request.
    struct FakeSynth {
        requests: Vec<(String, String)>,
    }

    impl SpeechSynthesizer for FakeSynth {
        fn voices(&self) -> Vec<String> {
            ["am_michael", "bm_george", "af_bella", "jf_alpha"]
                .iter()
                .map(|v| v.to_string())
                .collect()
        }

        fn synthesize(&mut self, text: &str, voice_id: &str) -> Result<Vec<f32>, PolidebateError> {
            self.requests.push((text.to_string(), voice_id.to_string()));
            Ok(vec![0.5; text.chars().count()])
        }
    }

    fn narrator() -> Narrator<FakeSynth> {
        Narrator::new(FakeSynth { requests: Vec::new() }, VoicesConfig::default())
    }

    fn line(speaker: Persona, text: &str) -> ScriptLine {
        ScriptLine {
            speaker,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_audio_filename_pattern() {
        let name = audio_filename(
            0,
            &line(Persona::Carnegie, "Wages have not kept up with rent in most cities"),
        );
        assert_eq!(name, "01_CARNEGIE_Wages_have_not_kept_up_with_re.wav");

        let name = audio_filename(11, &line(Persona::Mellon, "50/50 split"));
        assert_eq!(name, "12_MELLON_50_50_split.wav");
    }

    #[test]
    fn test_combine_audio_segments() {
        let combined = combine_audio_segments(vec![vec![1.0, 1.0], vec![2.0, 2.0]], 0.1, 10);

        assert_eq!(combined.len(), 5);
        assert_eq!(combined[2], 0.0);
    }

    #[test]
    fn test_split_into_chunks() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert_eq!(chunks, vec!["Hello world. This is a test.", "Another sentence here."]);
    }

    #[test]
    fn test_adjust_audio_speed_halves_length() {
        assert_eq!(adjust_audio_speed(vec![0.0; 100], 2.0).len(), 50);
        assert_eq!(adjust_audio_speed(vec![0.0; 100], 1.0).len(), 100);
    }

    #[test]
    fn test_unknown_voice_lists_english_voices() {
        let narrator = narrator();
        let err = narrator.validate_voice("xx_nobody").unwrap_err().to_string();

        assert!(err.contains("Unknown voice 'xx_nobody'"));
        assert!(err.contains("  - af_bella\n  - am_michael\n  - bm_george"));
        assert!(!err.contains("jf_alpha"));
    }

    #[test]
    fn test_narrate_writes_one_file_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut narrator = narrator();
        let lines = vec![
            line(Persona::Carnegie, "Raise the wage."),
            line(Persona::Mellon, "Jobs will vanish."),
        ];

        let narration = narrator.narrate(&lines, dir.path(), true).unwrap();

        let names: Vec<_> = narration
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["01_CARNEGIE_Raise_the_wage..wav", "02_MELLON_Jobs_will_vanish..wav"]
        );
        assert!(narration.combined.as_ref().unwrap().exists());

        let voices: Vec<_> = narrator.synth.requests.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(voices, vec!["am_michael", "bm_george"]);

        let reader = hound::WavReader::open(&narration.files[0]).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let expected = "Raise the wage.".len()
            + silence(CHUNK_PAUSE_SECS).len()
            + silence(TRAILING_PAD_SECS).len();
        assert_eq!(reader.len() as usize, expected);
    }

    #[test]
    fn test_narrate_rejects_unknown_persona_voice() {
        let dir = tempfile::tempdir().unwrap();
        let voices = VoicesConfig {
            mellon_voice: "missing".to_string(),
            ..VoicesConfig::default()
        };
        let mut narrator = Narrator::new(FakeSynth { requests: Vec::new() }, voices);

        let result = narrator.narrate(&[line(Persona::Carnegie, "Hi.")], dir.path(), false);

        assert!(matches!(result, Err(PolidebateError::Tts(_))));
        assert!(narrator.synth.requests.is_empty());
    }
}
