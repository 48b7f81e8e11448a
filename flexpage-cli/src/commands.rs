//! Command execution.

use crate::{Commands, PageArgs, PageType};
use colored::Colorize;
use flexpage_client::Client;
use flexpage_core::{EncodeRequest, FlexEncoder, Message};
use flexpage_protocol::message::{EncodeParams, EncodeResult, InfoResult, MessageParams};
use std::path::Path;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Executes a server command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> CliResult<String> {
    match cmd {
        Commands::Ping => {
            client.ping().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Info => {
            let info = client.info().await?;
            Ok(format_info(&info))
        }

        Commands::Page { page, hex } => {
            let params = page.to_params()?;
            let result = client.encode(params).await?;
            Ok(format_page(&result, hex))
        }

        Commands::Encode { .. } => Err("encode runs offline, not through the server".into()),
    }
}

/// Encodes a page without a server and writes one byte per symbol.
pub fn encode_offline(page: &PageArgs, output: &Path, hex: bool) -> CliResult<String> {
    let request = page.to_request()?;
    let transmission = FlexEncoder::default().encode(&request)?;
    std::fs::write(output, transmission.symbols.symbols())?;

    let address = &transmission.address;
    let mut out = format!(
        "{} page for {} to {}\n  Frame: {} cycle {} phase {}, starts {}\n  Symbols: {} at {} symbols/s ({} ms)",
        "Encoded".green(),
        format_capcodes(&request.recipients()).cyan(),
        output.display(),
        address.frame,
        address.cycle,
        address.phase,
        transmission.starts_at.format("%H:%M:%S%.3f"),
        transmission.symbols.len(),
        transmission.symbols.symbol_rate(),
        transmission.symbols.duration().as_millis()
    );
    if hex {
        out.push_str(&format!(
            "\n  Packed: {}",
            hex::encode(transmission.symbols.to_packed())
        ));
    }
    Ok(out)
}

impl PageArgs {
    fn checked_text(&self) -> Result<Option<&str>, String> {
        match (self.kind, self.text.as_deref()) {
            (PageType::Tone, Some(_)) => Err("tone-only pages carry no text".to_string()),
            (PageType::Tone, None) => Ok(None),
            (_, None) => Err("message text is required".to_string()),
            (_, Some(text)) => Ok(Some(text)),
        }
    }

    /// Builds ENCODE parameters for the server.
    pub fn to_params(&self) -> Result<EncodeParams, String> {
        let message = match (self.kind, self.checked_text()?) {
            (PageType::Numeric, Some(text)) => MessageParams::numeric(text),
            (PageType::Alpha, Some(text)) => MessageParams::alphanumeric(text),
            _ => MessageParams::tone_only(),
        };
        let mut params = EncodeParams::new(self.capcode, message);
        params.extra_capcodes = self.also.clone();
        params.baud_rate = self.baud;
        params.frequency_hz = self.freq;
        params.cycle_count = self.cycle;
        Ok(params)
    }

    /// Builds an encoder request for offline use.
    pub fn to_request(&self) -> Result<EncodeRequest, String> {
        let message = match (self.kind, self.checked_text()?) {
            (PageType::Numeric, Some(text)) => Message::Numeric(text.to_string()),
            (PageType::Alpha, Some(text)) => Message::Alphanumeric(text.to_string()),
            _ => Message::ToneOnly,
        };
        let mut request = EncodeRequest::new(self.capcode, message)
            .with_baud_rate(self.baud)
            .with_extra_capcodes(self.also.iter().copied());
        if let Some(hz) = self.freq {
            request = request.with_frequency(hz);
        }
        if let Some(cycle) = self.cycle {
            request = request.with_cycle_count(cycle);
        }
        Ok(request)
    }
}

fn format_capcodes(capcodes: &[u32]) -> String {
    capcodes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_page(result: &EncodeResult, hex: bool) -> String {
    let mut out = format!(
        "{} page to {}\n  Frame: {} cycle {} phase {} (+{} ms into the hour)\n  Symbols: {} at {} symbols/s ({} ms)\n  Channel: {} Hz{}",
        "Sent".green(),
        format_capcodes(&result.recipients).cyan(),
        result.frame,
        result.cycle,
        result.phase,
        result.frame_offset_ms,
        result.symbol_count,
        result.symbol_rate,
        result.duration_ms,
        result.center_frequency_hz,
        if result.retuned {
            format!(" {}", "(retuned)".yellow())
        } else {
            String::new()
        }
    );
    if hex {
        out.push_str(&format!("\n  Packed: {}", result.symbols));
    }
    out
}

fn format_info(info: &InfoResult) -> String {
    let baud_rates = info
        .baud_rates
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}\n  Protocol: v{}\n  Channel: {} Hz\n  Baud rates: {}\n  Sink: {}\n  Queue capacity: {}\n  Features: {}",
        format!("{} {}", info.server_name, info.server_version).bold(),
        info.protocol_version,
        info.center_frequency_hz,
        baud_rates,
        info.sink.cyan(),
        info.queue_capacity,
        info.features.join(", ")
    )
}
