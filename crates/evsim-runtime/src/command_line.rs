//! Command-line driver surface
//!
//! Options take the form `--key=value` or `--key value`; a single leading
//! dash is accepted for registered keys. The `clap` command is rebuilt on
//! every parse from what is registered at that moment: values added with
//! `add_value`, every `Type::Attribute` construction default, every global
//! value and the `--Print*` requests. Arguments that are not options fill
//! the values registered with `add_non_option` in order; the rest are kept
//! as extra non-options.

use std::any::TypeId as StdTypeId;
use std::collections::HashSet;
use std::error::Error as _;
use std::fmt::Display;
use std::io::{self, Write};
use std::str::FromStr;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use evsim_config::Config;
use evsim_core::{log_function, log_logic, KernelError, KernelResult, LogComponent};
use evsim_object::{GlobalValue, TypeId};

static LOG: LogComponent = LogComponent::new("CommandLine");

/// Id of the positional collecting unregistered non-options
const EXTRA: &str = "extra-non-options";

/// What the driver should do after parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Carry on with the simulation
    Run,
    /// A `--Print*` request was served; exit with code 0
    Exit,
}

#[derive(Clone)]
enum BindingKind {
    Value { flag: bool, validate: fn(&str) -> bool },
    /// Alias for the construction default `Type::Attribute`
    Attribute(String),
}

impl std::fmt::Debug for BindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingKind::Value { flag, .. } => f.debug_struct("Value").field("flag", flag).finish(),
            BindingKind::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
        }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    help: String,
    default: String,
    value: Option<String>,
    kind: BindingKind,
}

impl Binding {
    fn current(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.default)
    }
}

fn parses<T: FromStr>(text: &str) -> bool {
    text.parse::<T>().is_ok()
}

fn value_binding<T: FromStr + Display + 'static>(name: &str, help: &str, default: T) -> Binding {
    Binding {
        name: name.into(),
        help: help.into(),
        default: default.to_string(),
        value: None,
        kind: BindingKind::Value {
            flag: StdTypeId::of::<T>() == StdTypeId::of::<bool>(),
            validate: parses::<T>,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Print {
    Globals,
    Groups,
    Group,
    TypeIds,
    Attributes,
    Help,
}

/// `(key, request, value name, help)`
const GENERAL_ARGUMENTS: [(&str, Print, Option<&str>, &str); 6] = [
    ("PrintGlobals", Print::Globals, None, "Print the list of globals."),
    ("PrintGroups", Print::Groups, None, "Print the list of groups."),
    ("PrintGroup", Print::Group, Some("group"), "Print all TypeIds of group."),
    ("PrintTypeIds", Print::TypeIds, None, "Print all TypeIds."),
    ("PrintAttributes", Print::Attributes, Some("typeid"), "Print all attributes of typeid."),
    ("PrintHelp", Print::Help, None, "Print this help message."),
];

/// How a matched option is applied
#[derive(Debug, Clone)]
enum Target {
    Option(usize),
    NonOption(usize),
    Default(String),
    Global(String),
    Print(Print),
}

/// `--key` option taking one value, either `--key=v` or `--key v`
fn value_arg(key: &str) -> Arg {
    Arg::new(key.to_string())
        .long(key.to_string())
        .value_name(key.to_string())
        .action(ArgAction::Set)
        .num_args(1)
        .allow_hyphen_values(true)
}

/// Value parser checking that the text parses as the bound type
fn validator(
    name: String,
    flag: bool,
    validate: fn(&str) -> bool,
) -> impl Fn(&str) -> Result<String, KernelError> + Clone + Send + Sync + 'static {
    move |text: &str| {
        let value = if flag { normalize_flag(text) } else { text.to_string() };
        if validate(&value) {
            Ok(value)
        } else {
            Err(KernelError::MalformedValue {
                expected: format!("--{name}"),
                value: text.into(),
            })
        }
    }
}

fn from_clap_error(err: clap::Error) -> KernelError {
    if let Some(kernel) = err.source().and_then(|s| s.downcast_ref::<KernelError>()) {
        return kernel.clone();
    }
    let context = |kind| match err.get(kind) {
        Some(ContextValue::String(s)) => s.clone(),
        _ => String::new(),
    };
    match err.kind() {
        ErrorKind::UnknownArgument => {
            let arg = context(ContextKind::InvalidArg);
            let key = arg.split('=').next().unwrap_or_default();
            KernelError::UnknownAttribute {
                type_name: "CommandLine".into(),
                name: key.to_string(),
            }
        }
        _ => KernelError::MalformedValue {
            expected: context(ContextKind::InvalidArg),
            value: context(ContextKind::InvalidValue),
        },
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    name: String,
    usage: String,
    options: Vec<Binding>,
    non_options: Vec<Binding>,
    extra: Vec<String>,
}

impl CommandLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text printed at the top of `--PrintHelp`
    pub fn usage(&mut self, usage: &str) -> &mut Self {
        self.usage = usage.to_string();
        self
    }

    /// Program name, taken from the first argument
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Register `--name`, parsed as `T`. A `bool` value also accepts the
    /// bare `--name` form.
    pub fn add_value<T: FromStr + Display + 'static>(&mut self, name: &str, help: &str, default: T) -> &mut Self {
        self.options.retain(|b| b.name != name);
        self.options.push(value_binding(name, help, default));
        self
    }

    /// Register `--name` as a short form of the default `Type::Attribute`
    pub fn add_attribute_alias(&mut self, name: &str, attribute: &str) -> KernelResult<&mut Self> {
        let (type_name, attr) = attribute.rsplit_once("::").ok_or_else(|| KernelError::MalformedValue {
            expected: "Type::Attribute".into(),
            value: attribute.into(),
        })?;
        let tid = TypeId::try_lookup_by_name(type_name)?;
        let info = tid.lookup_attribute_by_name(attr)?;
        self.options.retain(|b| b.name != name);
        self.options.push(Binding {
            name: name.into(),
            help: info.help.clone(),
            default: info.initial_value.serialize_to_string(&info.checker),
            value: None,
            kind: BindingKind::Attribute(attribute.into()),
        });
        Ok(self)
    }

    /// Register the next positional argument, parsed as `T`
    pub fn add_non_option<T: FromStr + Display + 'static>(&mut self, name: &str, help: &str, default: T) -> &mut Self {
        self.non_options.push(value_binding(name, help, default));
        self
    }

    /// Current value of a registered option or non-option
    pub fn get_value<T: FromStr>(&self, name: &str) -> Option<T> {
        self.options
            .iter()
            .chain(&self.non_options)
            .find(|b| b.name == name)
            .and_then(|b| b.current().parse().ok())
    }

    /// Positional arguments beyond the registered non-options
    pub fn get_extra_non_option(&self, index: usize) -> Option<&str> {
        self.extra.get(index).map(String::as_str)
    }

    pub fn get_n_extra_non_options(&self) -> usize {
        self.extra.len()
    }

    /// The `clap` command for everything registered right now, with the
    /// meaning of each argument id
    fn build_command(&self) -> (Command, Vec<(String, Target)>) {
        let mut command = Command::new(self.name.clone())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .disable_help_subcommand(true)
            .args_override_self(true);
        if !self.usage.is_empty() {
            command = command.about(self.usage.clone());
        }
        let mut targets = Vec::new();
        let mut taken = HashSet::new();

        for (key, print, value_name, help) in GENERAL_ARGUMENTS {
            taken.insert(key.to_string());
            let arg = match value_name {
                Some(value_name) => value_arg(key).value_name(value_name),
                None => Arg::new(key).long(key).action(ArgAction::SetTrue),
            };
            command = command.arg(arg.help(help).help_heading("General Arguments"));
            targets.push((key.to_string(), Target::Print(print)));
        }

        for (index, binding) in self.options.iter().enumerate() {
            if !taken.insert(binding.name.clone()) {
                continue;
            }
            let arg = value_arg(&binding.name)
                .help(format!("{} [{}]", binding.help, binding.default))
                .help_heading("Program Options");
            let arg = match binding.kind {
                BindingKind::Value { flag: true, validate } => arg
                    .num_args(0..=1)
                    .require_equals(true)
                    .default_missing_value("true")
                    .value_parser(validator(binding.name.clone(), true, validate)),
                BindingKind::Value { flag: false, validate } => {
                    arg.value_parser(validator(binding.name.clone(), false, validate))
                }
                BindingKind::Attribute(_) => arg,
            };
            command = command.arg(arg);
            targets.push((binding.name.clone(), Target::Option(index)));
        }

        let mut position = 0;
        for (index, binding) in self.non_options.iter().enumerate() {
            if !taken.insert(binding.name.clone()) {
                continue;
            }
            position += 1;
            let mut arg = Arg::new(binding.name.clone())
                .index(position)
                .action(ArgAction::Set)
                .help(format!("{} [{}]", binding.help, binding.default));
            if let BindingKind::Value { validate, .. } = binding.kind {
                arg = arg.value_parser(validator(binding.name.clone(), false, validate));
            }
            command = command.arg(arg);
            targets.push((binding.name.clone(), Target::NonOption(index)));
        }
        command = command.arg(
            Arg::new(EXTRA)
                .index(position + 1)
                .num_args(1..)
                .action(ArgAction::Append)
                .hide(true),
        );

        for tid in TypeId::registered() {
            for info in tid.attributes() {
                let key = format!("{}::{}", tid.name(), info.name);
                if taken.insert(key.clone()) {
                    command = command.arg(value_arg(&key).hide(true));
                    targets.push((key.clone(), Target::Default(key)));
                }
            }
        }

        for global in GlobalValue::iter() {
            if taken.insert(global.name.clone()) {
                command = command.arg(value_arg(&global.name).hide(true));
                targets.push((global.name.clone(), Target::Global(global.name.clone())));
            }
        }
        (command, targets)
    }

    /// Parse `args`, the first being the program name. `--Print*` output
    /// goes to `out`.
    pub fn try_parse_with<I, S, W>(&mut self, args: I, out: &mut W) -> KernelResult<ParseOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        W: Write,
    {
        let mut args = args.into_iter().map(Into::into);
        if let Some(program) = args.next() {
            self.name = program
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(program.as_str())
                .to_string();
        }
        let (mut command, targets) = self.build_command();
        let keys: HashSet<&str> = targets
            .iter()
            .filter(|(_, target)| !matches!(target, Target::NonOption(_)))
            .map(|(key, _)| key.as_str())
            .collect();
        let args: Vec<String> = args.map(|arg| long_form(arg, &keys)).collect();
        log_function!(LOG, "parse {} arguments", args.len());

        let matches = command
            .try_get_matches_from_mut(args.iter())
            .map_err(from_clap_error)?;

        let mut given: Vec<(usize, &str, &Target)> = targets
            .iter()
            .filter(|(key, _)| matches.value_source(key) == Some(ValueSource::CommandLine))
            .filter_map(|(key, target)| matches.index_of(key).map(|at| (at, key.as_str(), target)))
            .collect();
        given.sort_by_key(|(at, ..)| *at);

        for (_, key, target) in given {
            match target {
                Target::Print(print) => {
                    self.serve(*print, &matches, key, out)?;
                    return Ok(ParseOutcome::Exit);
                }
                Target::Option(index) => {
                    let value = matched_value(&matches, key);
                    let binding = &mut self.options[*index];
                    if let BindingKind::Attribute(attribute) = &binding.kind {
                        Config::try_set_default(attribute, value.as_str())?;
                    }
                    log_logic!(LOG, "--{}={}", key, value);
                    binding.value = Some(value);
                }
                Target::NonOption(index) => {
                    self.non_options[*index].value = Some(matched_value(&matches, key));
                }
                Target::Default(name) => {
                    let value = matched_value(&matches, key);
                    log_logic!(LOG, "default {}={}", name, value);
                    Config::try_set_default(name, value.as_str())?;
                }
                Target::Global(name) => Config::try_set_global(name, matched_value(&matches, key).as_str())?,
            }
        }
        self.extra = matches
            .get_many::<String>(EXTRA)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        Ok(ParseOutcome::Run)
    }

    pub fn try_parse<I, S>(&mut self, args: I) -> KernelResult<ParseOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.try_parse_with(args, &mut io::stdout().lock())
    }

    /// Parse the process arguments. Exits with code 0 after a `--Print*`
    /// request; aborts on any error.
    #[track_caller]
    pub fn parse(&mut self) {
        match self.try_parse(std::env::args()) {
            Ok(ParseOutcome::Run) => {}
            Ok(ParseOutcome::Exit) => std::process::exit(0),
            Err(e) => e.fatal(),
        }
    }

    fn serve<W: Write>(&self, print: Print, matches: &ArgMatches, key: &str, out: &mut W) -> KernelResult<()> {
        match print {
            Print::Help => self.print_help(out)?,
            Print::Globals => print_globals(out)?,
            Print::TypeIds => print_type_ids(out)?,
            Print::Groups => print_groups(out)?,
            Print::Group => print_group(&matched_value(matches, key), out)?,
            Print::Attributes => print_attributes(&matched_value(matches, key), out)?,
        }
        Ok(())
    }

    /// Help text listing registered options, non-options and the general
    /// arguments
    pub fn print_help<W: Write>(&self, out: &mut W) -> KernelResult<()> {
        let (mut command, _) = self.build_command();
        write!(out, "{}", command.render_help())?;
        Ok(())
    }
}

fn matched_value(matches: &ArgMatches, key: &str) -> String {
    matches.get_one::<String>(key).cloned().unwrap_or_default()
}

/// Rewrite `-key[=v]` as `--key[=v]` when `key` is a registered option
fn long_form(arg: String, keys: &HashSet<&str>) -> String {
    let registered = match arg.strip_prefix('-') {
        Some(rest) if !rest.starts_with('-') => keys.contains(rest.split('=').next().unwrap_or_default()),
        _ => false,
    };
    if registered {
        format!("-{arg}")
    } else {
        arg
    }
}

fn normalize_flag(value: &str) -> String {
    match value {
        "1" => "true".into(),
        "0" => "false".into(),
        other => other.to_string(),
    }
}

fn print_globals<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Global values:")?;
    for global in GlobalValue::iter() {
        writeln!(out, "    --{}=[{}]", global.name, global.serialized())?;
        writeln!(out, "        {}", global.help)?;
    }
    Ok(())
}

fn print_type_ids<W: Write>(out: &mut W) -> io::Result<()> {
    let mut names: Vec<String> = TypeId::registered().into_iter().map(TypeId::name).collect();
    names.sort();
    writeln!(out, "Registered TypeIds:")?;
    for name in names {
        writeln!(out, "    {name}")?;
    }
    Ok(())
}

fn print_groups<W: Write>(out: &mut W) -> io::Result<()> {
    let mut groups: Vec<String> = TypeId::registered()
        .into_iter()
        .map(TypeId::group_name)
        .filter(|g| !g.is_empty())
        .collect();
    groups.sort();
    groups.dedup();
    writeln!(out, "Registered TypeId groups:")?;
    for group in groups {
        writeln!(out, "    {group}")?;
    }
    Ok(())
}

fn print_group<W: Write>(group: &str, out: &mut W) -> io::Result<()> {
    let mut names: Vec<String> = TypeId::registered()
        .into_iter()
        .filter(|tid| tid.group_name() == group)
        .map(TypeId::name)
        .collect();
    names.sort();
    writeln!(out, "TypeIds in group {group}:")?;
    for name in names {
        writeln!(out, "    {name}")?;
    }
    Ok(())
}

fn print_attributes<W: Write>(type_name: &str, out: &mut W) -> KernelResult<()> {
    let mut tid = TypeId::try_lookup_by_name(type_name)?;
    writeln!(out, "Attributes for TypeId {type_name}")?;
    while !tid.is_none() {
        let attributes = tid.attributes();
        if !attributes.is_empty() && tid.name() != type_name {
            writeln!(out, "  Defined in {}", tid.name())?;
        }
        for info in attributes {
            writeln!(
                out,
                "    --{}::{}=[{}]",
                tid.name(),
                info.name,
                info.initial_value.serialize_to_string(&info.checker)
            )?;
            writeln!(out, "        {}", info.help)?;
        }
        tid = tid.parent();
    }
    Ok(())
}
