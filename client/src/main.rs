//! earshot-listen – Einstiegspunkt
//!
//! Spielt einen Call vom Relay auf dem Standard-Ausgabegeraet ab.
//! Steuerung ueber stdin: `p` Pause/Fortsetzen, `+`/`-` Lautstaerke,
//! `s` Status, `q` Beenden.

use anyhow::Result;
use clap::Parser;
use earshot_audio::{ausgabegeraete_auflisten, ResampleMethode};
use earshot_core::{CallId, HoererEreignis};
use earshot_listener::{HoererClient, HoererKonfig, STANDARD_RELAY_URL};
use earshot_observability::logging_initialisieren;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Lautstaerke-Schritt fuer `+` und `-`
const LAUTSTAERKE_SCHRITT: f32 = 0.1;

/// Earshot Hoerer
#[derive(Parser, Debug)]
#[command(name = "earshot-listen", version)]
struct Args {
    /// WebSocket-Adresse des Relays
    #[arg(long, env = "EARSHOT_RELAY_URL", default_value = STANDARD_RELAY_URL)]
    relay_url: String,

    /// Call-ID des Telefonats
    #[arg(long, env = "EARSHOT_CALL_SID", required_unless_present = "geraete_auflisten")]
    call_sid: Option<String>,

    /// Anfangs-Lautstaerke (0.0 bis 1.0)
    #[arg(long, default_value_t = 1.0)]
    lautstaerke: f32,

    /// Resampling-Verfahren: naechster-nachbar oder linear
    #[arg(long, default_value_t = ResampleMethode::NaechsterNachbar)]
    resampling: ResampleMethode,

    /// Null-Senke statt Audio-Geraet
    #[arg(long)]
    ohne_geraet: bool,

    /// Teilstring des Ausgabegeraet-Namens
    #[arg(long)]
    geraet: Option<String>,

    /// Ausgabegeraete auflisten und beenden
    #[arg(long)]
    geraete_auflisten: bool,

    /// Log-Level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log-Format: text oder json
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging_initialisieren(&args.log_level, &args.log_format);

    if args.geraete_auflisten {
        for geraet in ausgabegeraete_auflisten()? {
            println!(
                "{} (Kanaele: {}, Raten: {:?}, Standard: {:?})",
                geraet.name, geraet.kanaele, geraet.abtastraten, geraet.standard_rate
            );
        }
        return Ok(());
    }

    let call_sid = args
        .call_sid
        .ok_or_else(|| anyhow::anyhow!("--call-sid fehlt"))?;
    let konfig = HoererKonfig {
        relay_url: args.relay_url,
        call_id: CallId::neu(call_sid)?,
        resampling: args.resampling,
        lautstaerke: args.lautstaerke,
        ohne_geraet: args.ohne_geraet,
        geraet: args.geraet,
    };

    let client = HoererClient::verbinden(konfig).await?;
    let mut ereignisse = client.ereignisse();
    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C empfangen");
                break;
            }
            ereignis = ereignisse.recv() => match ereignis {
                Ok(HoererEreignis::Getrennt) => {
                    tracing::info!("Relay getrennt, beende");
                    break;
                }
                Ok(HoererEreignis::Fehler(b)) => tracing::warn!(klasse = ?b.klasse, "{}", b.nachricht),
                Ok(andere) => tracing::debug!(ereignis = ?andere, "Ereignis"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            zeile = zeilen.next_line() => match zeile? {
                Some(zeile) => {
                    if !befehl_ausfuehren(&client, zeile.trim()).await {
                        break;
                    }
                }
                None => {
                    // stdin geschlossen: weiter abspielen bis Ctrl-C
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
        }
    }

    client.deaktivieren().await?;
    Ok(())
}

/// Fuehrt einen stdin-Befehl aus; `false` beendet das Programm
async fn befehl_ausfuehren(client: &HoererClient, befehl: &str) -> bool {
    match befehl {
        "p" => match client.wiedergabe_umschalten().await {
            Ok(true) => println!("Wiedergabe fortgesetzt"),
            Ok(false) => println!("Wiedergabe angehalten"),
            Err(e) => println!("Umschalten nicht moeglich: {e}"),
        },
        "+" | "-" => {
            let schritt = if befehl == "+" {
                LAUTSTAERKE_SCHRITT
            } else {
                -LAUTSTAERKE_SCHRITT
            };
            let neu = client.lautstaerke_setzen(client.lautstaerke() + schritt);
            println!("Lautstaerke: {:.0}%", neu * 100.0);
        }
        "s" => {
            let status = client.status();
            println!(
                "verbunden: {}, spielt: {}, letzter Fehler: {}",
                status.verbunden,
                status.spielt,
                status
                    .letzter_fehler
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "-".into())
            );
        }
        "q" => return false,
        "" => {}
        andere => println!("Unbekannter Befehl '{andere}' (p, +, -, s, q)"),
    }
    true
}
