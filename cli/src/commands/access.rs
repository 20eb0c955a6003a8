use crate::{helper, CLIError};
use bluetooth_mesh_provisioner::access::{AccessMessage, Opcode};
use bluetooth_mesh_provisioner::mesh::CompanyID;

pub fn sub_command() -> clap::App<'static, 'static> {
    clap::SubCommand::with_name("access")
        .about("Print the access PDU for an opcode and its parameters")
        .arg(
            clap::Arg::with_name("opcode")
                .help("SIG opcode (`0x8003`) or 6-bit vendor opcode with --company")
                .required(true)
                .value_name("OPCODE")
                .validator(helper::is_u16_validator),
        )
        .arg(
            clap::Arg::with_name("parameters")
                .help("parameters hex")
                .value_name("PARAMETERS_HEX")
                .validator(helper::is_hex_validator),
        )
        .arg(
            clap::Arg::with_name("company")
                .short("c")
                .long("company")
                .takes_value(true)
                .value_name("COMPANY_ID")
                .help("company id of a vendor opcode")
                .validator(helper::is_u16_validator),
        )
}
pub fn access_matches(
    parent_logger: &slog::Logger,
    access_matches: &clap::ArgMatches,
) -> Result<(), CLIError> {
    let logger = parent_logger.new(o!("command" => "access"));
    let opcode = helper::parse_u16(access_matches.value_of("opcode").expect("required by clap"))
        .expect("validated by clap");
    let opcode = match access_matches.value_of("company") {
        Some(company) => {
            let company = CompanyID(helper::parse_u16(company).expect("validated by clap"));
            if opcode > 0x3F {
                return Err(helper::bad_value(format!(
                    "vendor opcode `{:#x}` is wider than 6 bits",
                    opcode
                )));
            }
            Opcode::vendor(opcode as u8, company)
        }
        None if opcode < 0x7F || opcode & 0xC000 == 0x8000 => Opcode::sig(opcode),
        None => {
            return Err(helper::bad_value(format!(
                "`{:#x}` is not a SIG opcode",
                opcode
            )))
        }
    };
    let parameters = hex::decode(access_matches.value_of("parameters").unwrap_or(""))
        .expect("validated by clap");
    debug!(logger, "building"; "opcode" => %opcode, "parameters" => parameters.len());
    let pdu = AccessMessage::new(opcode, parameters)
        .to_bytes()
        .map_err(|e| CLIError::OtherMessage(e.to_string()))?;
    println!("{}", hex::encode(pdu));
    Ok(())
}
