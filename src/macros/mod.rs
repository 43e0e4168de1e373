/*!
The macro language.

A macro is a `;`-separated string of instructions. Each instruction starts with a
single-character opcode followed by its raw argument, optionally prefixed by a
loop header (`[n]` or `[span:n]`):

```text
e;sexplorer.exe{ENTER};t1000;[3]fsave.png<tl>;[2:5]n;l100:200
```

Submodules:
- `opcode`: the static opcode registry (classes, argument shapes, descriptions).
- `parser`: tokenizes a macro string into `Instruction`s. No semantic checks.
- `validator`: positioned, side-effect-free checks of a parsed macro.
- `escape`: converts arbitrary text into injection-safe key syntax.
- `translate`: readable descriptions and short-code <-> verbose translation.
*/

pub mod escape;
pub mod opcode;
pub mod parser;
pub mod translate;
pub mod validator;

pub use escape::to_injection_form;
pub use opcode::{ArgShape, OPCODES, Opcode, OpcodeClass, OpcodeInfo, lookup};
pub use parser::{Instruction, LoopHeader, LoopSpec, Macro, parse};
pub use translate::{describe, to_short_code, to_verbose};
pub use validator::{MacroError, ValidationOutcome, validate};

/// File extension every image reference must carry.
pub const IMAGE_EXTENSION: &str = ".png";
