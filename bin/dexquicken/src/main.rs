mod error;

use dexquicken::dex::CodeItem;
use dexquicken::quicken::{self, QuickenSection, QuickenTable};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use error::Error;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("dexquicken")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Inspect quicken tables and restore quickened dex code")
        .subcommand_required(true)
        .subcommand(
            Command::new("dump-table")
                .about("Print the entries of a quicken table")
                .arg(
                    Arg::new("offset")
                        .long("offset")
                        .value_name("BYTES")
                        .value_parser(value_parser!(usize))
                        .default_value("0")
                        .help("Where the table starts in the file"),
                )
                .arg(
                    Arg::new("INPUT")
                        .help("File containing the table")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("dump-section")
                .about("List the quickened methods of a quickening info section")
                .arg(
                    Arg::new("INPUT")
                        .help("File containing the section")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("unquicken")
                .about("Restore the original instructions of a quickened code item")
                .arg(
                    Arg::new("code")
                        .long("code")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .help("Quickened instructions, as little-endian code units"),
                )
                .arg(
                    Arg::new("table")
                        .long("table")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .help("Quicken table produced when the code was quickened"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .help("Where to write the restored instructions"),
                )
                .arg(
                    Arg::new("keep-return-barrier")
                        .long("keep-return-barrier")
                        .action(ArgAction::SetTrue)
                        .help("Leave `return-void-no-barrier` as it is"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("dump-table", sub_matches)) => dump_table(sub_matches),
        Some(("dump-section", sub_matches)) => dump_section(sub_matches),
        Some(("unquicken", sub_matches)) => unquicken(sub_matches),
        _ => unreachable!("subcommand is required"),
    }
}

fn path_arg<'m>(matches: &'m ArgMatches, name: &str) -> &'m PathBuf {
    matches
        .get_one::<PathBuf>(name)
        .expect("required argument")
}

fn dump_table(matches: &ArgMatches) -> Result<(), Error> {
    let input = path_arg(matches, "INPUT");
    let offset = *matches.get_one::<usize>("offset").expect("defaulted argument");

    log::info!("Reading '{}'", input.display());
    let bytes = fs::read(input)?;
    let rest = bytes.get(offset..).ok_or(Error::OffsetPastEnd {
        offset,
        len: bytes.len(),
    })?;
    let table = QuickenTable::new(rest)?;

    println!(
        "{} entries ({} bytes)",
        table.len(),
        table.size_in_bytes()
    );
    for (idx, value) in table.iter().enumerate() {
        if value == quicken::NO_INDEX {
            println!("  {:>4}: no index", idx);
        } else {
            println!("  {:>4}: {}", idx, value);
        }
    }
    Ok(())
}

fn dump_section(matches: &ArgMatches) -> Result<(), Error> {
    let input = path_arg(matches, "INPUT");

    log::info!("Reading '{}'", input.display());
    let bytes = fs::read(input)?;
    let section = QuickenSection::new(&bytes)?;

    let mut quickened = 0;
    for method_index in section.quickened_methods() {
        if let Some(table) = section.quicken_table_of(method_index)? {
            println!("method@{}: {:?}", method_index, table);
            quickened += 1;
        }
    }
    println!(
        "{} of {} methods quickened",
        quickened,
        section.num_method_ids()
    );
    Ok(())
}

fn unquicken(matches: &ArgMatches) -> Result<(), Error> {
    let code_path = path_arg(matches, "code");
    let table_path = path_arg(matches, "table");
    let output_path = path_arg(matches, "output");
    let decompile_return_instruction = !matches.get_flag("keep-return-barrier");

    log::info!(
        "Reading '{}' and '{}'",
        code_path.display(),
        table_path.display()
    );
    let mut code = CodeItem::from_le_bytes(&fs::read(code_path)?)?;
    let table_bytes = fs::read(table_path)?;
    let table = QuickenTable::new(&table_bytes)?;
    if table.size_in_bytes() != table_bytes.len() {
        log::warn!(
            "Ignoring {} bytes after the quicken table",
            table_bytes.len() - table.size_in_bytes()
        );
    }

    quicken::dequicken(&mut code, table, decompile_return_instruction);

    log::info!("Writing '{}'", output_path.display());
    fs::write(output_path, code.to_le_bytes())?;
    Ok(())
}
