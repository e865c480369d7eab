use bal::codec::{BinaryReader, write_uvarint};
use bal::dispatch::envelope::{PayloadFormat, magic};
use bal::dispatch::encode_text_action;
use bal::name::Name;
use serde_json::Value;
use std::str::FromStr;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Err("missing command".into());
    }
    match args[1].as_str() {
        "envelope" => match args.get(2).map(String::as_str) {
            Some("binary") => cmd_envelope_binary(&args[3..]),
            Some("text") => cmd_envelope_text(&args[3..]),
            Some("inspect") => cmd_envelope_inspect(&args[3..]),
            Some(other) => Err(format!("unknown envelope command: {other}")),
            None => Err("missing envelope subcommand".into()),
        },
        "name" => match args.get(2).map(String::as_str) {
            Some("encode") => cmd_name_encode(&args[3..]),
            Some("decode") => cmd_name_decode(&args[3..]),
            Some(other) => Err(format!("unknown name command: {other}")),
            None => Err("missing name subcommand".into()),
        },
        other => {
            print_usage();
            Err(format!("unknown top-level command: {other}"))
        }
    }
}

/// Prints `magic || 'b' || uvarint(discriminant) || args` as hex. Arguments are
/// passed already encoded.
fn cmd_envelope_binary(args: &[String]) -> Result<(), String> {
    let contract = parse_flag_value(args, "--contract").ok_or("--contract is required")?;
    let discriminant = parse_flag_value(args, "--discriminant")
        .ok_or("--discriminant is required")?
        .parse::<u64>()
        .map_err(|e| format!("invalid --discriminant: {e}"))?;
    let encoded_args = match parse_flag_value(args, "--args-hex") {
        Some(raw) => hex::decode(raw.trim()).map_err(|e| format!("invalid --args-hex: {e}"))?,
        None => Vec::new(),
    };

    let mut payload = magic(&contract).into_bytes();
    payload.push(PayloadFormat::Binary.byte());
    write_uvarint(&mut payload, discriminant);
    payload.extend_from_slice(&encoded_args);
    println!("{}", hex::encode(payload));
    Ok(())
}

fn cmd_envelope_text(args: &[String]) -> Result<(), String> {
    let contract = parse_flag_value(args, "--contract").ok_or("--contract is required")?;
    let action = parse_flag_value(args, "--action").ok_or("--action is required")?;
    let action = Name::from_str(&action).map_err(|e| e.to_string())?;
    let values = match parse_flag_value(args, "--args") {
        Some(raw) => match serde_json::from_str::<Value>(&raw)
            .map_err(|e| format!("invalid --args: {e}"))?
        {
            Value::Array(values) => values,
            _ => return Err("--args must be a JSON array".into()),
        },
        None => Vec::new(),
    };
    let payload = encode_text_action(&contract, action, &values);
    if has_flag(args, "--raw") {
        println!("{}", String::from_utf8_lossy(&payload));
    } else {
        println!("{}", hex::encode(payload));
    }
    Ok(())
}

/// Classifies a hex payload against a contract name without any schema:
/// magic match, format, and the action selector.
fn cmd_envelope_inspect(args: &[String]) -> Result<(), String> {
    let contract = parse_flag_value(args, "--contract").ok_or("--contract is required")?;
    let payload = parse_flag_value(args, "--payload-hex").ok_or("--payload-hex is required")?;
    let payload = hex::decode(payload.trim()).map_err(|e| format!("invalid --payload-hex: {e}"))?;

    let magic = magic(&contract);
    let Some(body) = payload.strip_prefix(magic.as_bytes()) else {
        println!("wrong_magic");
        return Ok(());
    };
    let Some((&format, rest)) = body.split_first() else {
        println!("parse_failed\tempty body");
        return Ok(());
    };
    match PayloadFormat::from_byte(format) {
        Some(PayloadFormat::Binary) => {
            let mut reader = BinaryReader::new(rest);
            match reader.read_uvarint() {
                Ok(discriminant) => println!(
                    "binary\t{}\t{}\t{}",
                    discriminant,
                    reader.remaining(),
                    hex::encode(&rest[reader.position()..])
                ),
                Err(e) => println!("parse_failed\t{e}"),
            }
        }
        Some(PayloadFormat::Text) => {
            let text = String::from_utf8_lossy(rest);
            let text = text.trim_start();
            let (action, arguments) = text
                .split_once(char::is_whitespace)
                .unwrap_or((text, ""));
            match Name::from_str(action) {
                Ok(name) => println!("text\t{}\t{}", name, arguments.trim()),
                Err(e) => println!("parse_failed\t{e}"),
            }
        }
        None => println!("parse_failed\tunknown format byte {format:#04x}"),
    }
    Ok(())
}

fn cmd_name_encode(args: &[String]) -> Result<(), String> {
    let name = args.first().ok_or("missing name")?;
    let name = Name::from_str(name).map_err(|e| e.to_string())?;
    println!("{}\t{:#018x}", name.value(), name.value());
    Ok(())
}

fn cmd_name_decode(args: &[String]) -> Result<(), String> {
    let raw = args.first().ok_or("missing value")?;
    let value = match raw.strip_prefix("0x") {
        Some(hex_value) => u64::from_str_radix(hex_value, 16),
        None => raw.parse::<u64>(),
    }
    .map_err(|e| format!("invalid value: {e}"))?;
    println!("{}", Name::from_raw(value));
    Ok(())
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    for idx in 0..args.len() {
        if args[idx] == flag {
            return args.get(idx + 1).cloned();
        }
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!(
        "  bal envelope binary --contract <name> --discriminant <n> [--args-hex <hex>]"
    );
    eprintln!(
        "  bal envelope text --contract <name> --action <name> [--args <json-array>] [--raw]"
    );
    eprintln!("  bal envelope inspect --contract <name> --payload-hex <hex>");
    eprintln!("  bal name encode <name>");
    eprintln!("  bal name decode <u64|0xhex>");
}
