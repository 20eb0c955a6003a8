use crate::{helper, CLIError};
use bluetooth_mesh_provisioner::crypto::key::{AppKey, NetKey};
use bluetooth_mesh_provisioner::crypto::materials::NetworkKeys;
use bluetooth_mesh_provisioner::crypto::{k3, k4, s1};

pub fn sub_command() -> clap::App<'static, 'static> {
    clap::SubCommand::with_name("crypto")
        .about("Print key derivations (s1, k2, k3, k4)")
        .subcommand(
            clap::SubCommand::with_name("s1")
                .about("salt of an ASCII string")
                .arg(
                    clap::Arg::with_name("text")
                        .required(true)
                        .value_name("TEXT"),
                ),
        )
        .subcommand(
            clap::SubCommand::with_name("netkey")
                .about("NID, encryption key, privacy key (k2 master) and NetworkID (k3)")
                .arg(
                    clap::Arg::with_name("key_hex")
                        .help("128-bit big endian key hex")
                        .required(true)
                        .value_name("KEY_HEX")
                        .validator(helper::is_128_bit_hex_str_validator),
                ),
        )
        .subcommand(
            clap::SubCommand::with_name("appkey")
                .about("AID (k4)")
                .arg(
                    clap::Arg::with_name("key_hex")
                        .help("128-bit big endian key hex")
                        .required(true)
                        .value_name("KEY_HEX")
                        .validator(helper::is_128_bit_hex_str_validator),
                ),
        )
}
fn key_arg(matches: &clap::ArgMatches) -> [u8; 16] {
    helper::hex_str_to_bytes::<[u8; 16]>(matches.value_of("key_hex").expect("required by clap"))
        .expect("validated by clap")
}
pub fn crypto_matches(
    parent_logger: &slog::Logger,
    crypto_matches: &clap::ArgMatches,
) -> Result<(), CLIError> {
    let logger = parent_logger.new(o!("command" => "crypto"));
    debug!(logger, "crypto_sub_command");
    match crypto_matches.subcommand() {
        ("s1", Some(s1_matches)) => {
            let text = s1_matches.value_of("text").expect("required by clap");
            println!("s1: {}", hex::encode(s1(text.as_bytes()).0));
        }
        ("netkey", Some(netkey_matches)) => {
            let net_key = NetKey::new_bytes(key_arg(netkey_matches));
            let keys = NetworkKeys::from(&net_key);
            println!("nid: {:#04x}", keys.nid().value());
            println!("encryption key: {:x}", keys.encryption_key().key());
            println!("privacy key: {:x}", keys.privacy_key().key());
            println!("network id: {:016x}", k3(net_key.key()));
        }
        ("appkey", Some(appkey_matches)) => {
            let app_key = AppKey::new_bytes(key_arg(appkey_matches));
            println!("aid: {:#04x}", k4(&app_key).value());
        }
        ("", None) => error!(logger, "no_subcommand"),
        _ => unreachable!("unhandled crypto subcommand"),
    }
    Ok(())
}
